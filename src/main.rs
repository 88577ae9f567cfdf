use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod commands;
mod config;
mod conversation;
mod core;
mod display;
mod engine;
mod input;
mod providers;
mod tools;
mod utils;

use crate::app::Application;
use crate::cli::Args;
use crate::commands::create_command_registry;
use crate::config::{Config, Provider};
use crate::core::error::ChatError;
use crate::providers::factory::ProviderFactory;
use crate::tools::builtin::default_registry;

/// Logs go to stderr so they never mix with the answer on stdout.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("TOOLCHAT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<(), ChatError> {
    let mut config = Config::load()?;

    if let Some(name) = args.provider.as_deref() {
        let provider = Provider::from_str(name)
            .ok_or_else(|| {
                ChatError::Config(format!(
                    "Unknown provider: {} (expected one of {})",
                    name,
                    Provider::names()
                ))
            })?;
        config.active_provider = Some(provider);
    }
    config.apply_env_overrides(|key| std::env::var(key).ok());

    if args.router {
        config.orchestration.router = true;
    }
    if let Some(max) = args.max_iterations {
        config.orchestration.max_iterations = max;
    }
    config.orchestration.validate()?;

    let mut provider_config = config.active_provider_config();
    if let Some(model) = args.model.clone() {
        provider_config.model = Some(model);
    }

    let provider = ProviderFactory::new().create(&config.provider(), &provider_config)?;
    let registry = Arc::new(default_registry()?);

    let app = Application::new(args, config, provider, registry, create_command_registry()?);
    app.run().await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_level());

    if let Err(e) = run(args).await {
        display::display_error(&e.to_string());
        std::process::exit(1);
    }
}
