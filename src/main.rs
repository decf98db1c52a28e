use clap::Parser;
use evalcache::cli::{Cli, Commands};
use evalcache::types::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let config = if cli.config.exists() {
        Config::load(&cli.config).unwrap_or_else(|_| Config::default_config())
    } else {
        Config::default_config()
    };

    // CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("evalcache={}", log_level)
            .parse()
            .unwrap_or_else(|_| "evalcache=info".parse().expect("fallback directive is valid")),
    );

    if config.general.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => {
            evalcache::cli::commands::init(path).await?;
        }
        Commands::Status => {
            evalcache::cli::commands::status(&config).await?;
        }
        Commands::Get { key } => {
            evalcache::cli::commands::get(&key, &config).await?;
        }
        Commands::Purge => {
            evalcache::cli::commands::purge(&config).await?;
        }
        Commands::Clear => {
            evalcache::cli::commands::clear(&config).await?;
        }
        Commands::Version => {
            evalcache::cli::commands::version();
        }
    }

    Ok(())
}
