use clap::Parser;
use omega_ui::cli::{AppContext, Cli, Commands};
use omega_ui::config::Config;
use omega_ui::logstream::SinkRegistry;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry; run logs are routed to per-job sinks
    let sinks = Arc::new(SinkRegistry::new());
    let _telemetry = omega_ui::telemetry::init_telemetry(&config.telemetry, sinks.clone())?;

    let ctx = AppContext::new(config, sinks);

    match cli.command {
        Commands::Serve(args) => {
            tracing::info!("Starting log listener and console sessions");
            args.execute(&ctx).await?;
        }
        Commands::Backtest(args) => {
            args.execute(&ctx).await?;
        }
        Commands::Report(args) => {
            args.execute(&ctx).await?;
        }
        Commands::Strategies { module, refresh } => {
            ctx.print_strategies(module.as_deref(), refresh)?;
        }
        Commands::Users(args) => {
            args.execute(&ctx).await?;
        }
        Commands::Config => ctx.print_config(),
    }

    Ok(())
}
