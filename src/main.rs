use binary_edge::cli::{Cli, Commands};
use binary_edge::config::Config;
use binary_edge::context::AppContext;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {:#}", cli.config, e);
            eprintln!("Using default configuration");
            Config::parse(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    binary_edge::telemetry::init_telemetry(&config.telemetry)?;

    if let Commands::Config = cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let context = AppContext::from_config(config)?;
    match cli.command {
        Commands::Signals(args) => args.execute(&context).await?,
        Commands::Watch(args) => args.execute(&context).await?,
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&context.status())?);
        }
        Commands::Config => {}
    }

    Ok(())
}
