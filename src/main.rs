use clap::Parser;
use marketx::cli::{Cli, Commands};
use marketx::config::Config;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        eprintln!("Warning: config file {} not found", cli.config);
        eprintln!("Using default configuration");
        Config::with_default_catalog()
    };
    config.validate()?;

    // Initialize telemetry
    marketx::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Watch(args) => {
            tracing::info!("Starting price watch");
            args.execute(&config).await?;
        }
        Commands::Portfolio(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("# Effective configuration ({})", cli.config);
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
