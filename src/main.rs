//! Agent Observe demo driver: one instrumented call to a stub agent.
//!
//! # Usage
//!
//! ```bash
//! agent-observe-demo --prompt "Why is observability critical for AI agents?"
//! agent-observe-demo --fail --otlp-endpoint http://localhost:6006
//! ```
//!
//! Environment variables can also be used:
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector base URL
//! - `OTEL_EXPORTER_OTLP_HEADERS`: Export headers (`k=v,k2=v2`)
//! - `SERVICE_NAME_DEMO`: Service name
//! - `PROMPT`: Prompt to send
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use agent_observe::{AgentRun, Completion, Observability, ObservabilityConfig};
use clap::Parser;
use std::time::Duration;
use thiserror::Error;

/// Run one instrumented call against a stub echo agent.
#[derive(Parser, Debug)]
#[command(name = "agent-observe-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Service name reported to the collector
    #[arg(long, env = "SERVICE_NAME_DEMO", default_value = "demo-agent")]
    service_name: String,

    /// Prompt sent to the stub agent
    #[arg(long, env = "PROMPT", default_value = "Why is observability critical for AI agents?")]
    prompt: String,

    /// Framework tag recorded on the span and run record
    #[arg(long, default_value = "Demo")]
    framework: String,

    /// Model tag recorded on the span and run record
    #[arg(long, env = "DEMO_MODEL", default_value = "echo-1")]
    model: String,

    /// Simulated model latency in milliseconds
    #[arg(long = "latency-ms", default_value_t = 120)]
    latency_ms: u64,

    /// Make the stub agent fail
    #[arg(long)]
    fail: bool,

    #[command(flatten)]
    observability: ObservabilityConfig,
}

/// Failures of the stub agent.
#[derive(Error, Debug)]
enum DemoError {
    #[error("stub agent refused prompt: {0}")]
    Refused(String),
}

/// Stand-in for a framework call: sleeps, then echoes the prompt.
async fn echo_agent(prompt: &str, latency: Duration, fail: bool) -> Result<Completion<String>, DemoError> {
    tokio::time::sleep(latency).await;
    if fail {
        return Err(DemoError::Refused(prompt.to_string()));
    }

    let answer = format!("- You asked: {prompt}\n- The stub agent echoes it back.");
    let tokens = (prompt.split_whitespace().count() + answer.split_whitespace().count()) as u64;
    Ok(Completion::new(answer).with_tokens(tokens))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = cli.observability.clone();
    config.service_name = cli.service_name.clone();
    let obs = Observability::from_config(&config);

    let result = AgentRun::new(&obs, "demo.run", "demo")
        .with_attribute("framework", cli.framework.clone())
        .with_attribute("model", cli.model.clone())
        .run_async(&cli.prompt, || {
            echo_agent(&cli.prompt, Duration::from_millis(cli.latency_ms), cli.fail)
        })
        .await;

    match &result {
        Ok(answer) => tracing::info!(result = %answer, "Demo result"),
        Err(e) => tracing::error!(error = %e, "Demo run failed"),
    }

    obs.shutdown();

    let answer = result?;
    println!("{answer}");
    Ok(())
}
