mod cli;
mod terminal;
mod tools;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use riverbed_bedrock::BedrockProvider;
use riverbed_core::config::{load_dotenv, Config};
use riverbed_tool_runtime::{ChatRequest, StreamEvent, Usage};

use crate::cli::CliArgs;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let terminal = Terminal::new();

    let mut config = match &args.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    if let Some(model) = &args.model {
        config.bedrock.model = model.clone();
    }
    if let Some(schema) = &args.api_schema {
        config.bedrock.api_schema = Some(schema.clone());
    }
    if let Some(max_steps) = args.max_steps {
        config.agent.max_steps = max_steps;
    }
    config.log_summary();

    let registry = Arc::new(tools::registry().context("failed to register built-in tools")?);
    let provider = Arc::new(
        BedrockProvider::from_config(&config).context("failed to create Bedrock provider")?,
    );

    let mut request = ChatRequest::new(config.bedrock.model.clone())
        .with_prompt(args.prompt.clone())
        .with_registry(&registry)
        .with_max_tokens(config.agent.max_tokens)
        .with_max_steps(config.agent.max_steps);
    if let Some(system) = &args.system {
        request = request.with_system_prompt(system.clone());
    }
    if let Some(temperature) = config.agent.temperature {
        request = request.with_temperature(temperature);
    }

    let dialect = provider
        .dialect(&request)
        .context("failed to select a wire dialect")?;
    terminal.print_banner(&request.model, dialect.as_str())?;

    if args.no_stream {
        let response = match provider.text(request, registry).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Request failed");
                terminal.print_error(&e.to_string())?;
                bail!("request failed ({})", e.kind());
            }
        };
        for step in &response.steps {
            for result in &step.tool_results {
                terminal.display_tool_result(result)?;
            }
        }
        terminal.print_text(&response.text)?;
        info!(steps = response.steps.len(), finish_reason = ?response.finish_reason, "Done");
        terminal.print_usage(&response.usage)?;
        return Ok(());
    }

    let mut tool_loop = provider.stream(request, registry);
    let mut usage = Usage::default();
    let mut failure = None;
    while let Some(event) = tool_loop.next_event().await {
        terminal.display_event(&event)?;
        match event {
            StreamEvent::StreamEnd { usage: step, .. } => usage.add(&step),
            StreamEvent::Error { kind, .. } => failure = Some(kind),
            _ => {}
        }
    }
    info!(round_trips = tool_loop.depth(), "Done");
    terminal.print_usage(&usage)?;

    if let Some(kind) = failure {
        bail!("stream failed ({kind})");
    }
    Ok(())
}
