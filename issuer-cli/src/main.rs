//! issuer CLI - import CSV issues into GitHub Projects (v2)

mod commands;
mod logging;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use issuer_core::{Config, Overrides, Secrets};

use commands::{CopyArgs, ImportArgs, PurgeArgs, SampleArgs};

/// Bulk-create GitHub issues and project items from CSV files
#[derive(Parser, Debug)]
#[command(name = "issuer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/issuer/config.toml)
    #[arg(long, global = true, env = "ISSUER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for per-run log files (overrides config and env)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Requests allowed per rate-limit window (overrides config and env)
    #[arg(long, global = true)]
    max_requests: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create issues listed in a CSV file
    #[command(visible_alias = "i")]
    Import(ImportArgs),

    /// Print a sample CSV file
    CsvSample(SampleArgs),

    /// Copy the items of one project into another
    Copy(CopyArgs),

    /// Delete project items and close repository issues
    Purge(PurgeArgs),

    /// Show version information
    Version,

    /// Show current configuration
    Config {
        /// Create an empty secrets file at ~/.config/issuer/secrets.toml
        #[arg(long)]
        init_secrets: bool,
    },
}

impl Commands {
    /// Commands that call GitHub get a log file and need a token
    fn is_remote(&self) -> bool {
        match self {
            Commands::Import(args) => !args.dry_run,
            Commands::Copy(_) | Commands::Purge(_) => true,
            Commands::CsvSample(_) | Commands::Version | Commands::Config { .. } => false,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut overrides = match &cli.command {
        Some(Commands::Import(args)) => args.overrides(cli.log_dir.clone()),
        _ => Overrides {
            log_dir: cli.log_dir.clone(),
            ..Default::default()
        },
    };
    overrides.max_requests = cli.max_requests;
    let config = Config::load_with_overrides(cli.config.as_deref(), overrides)?;

    let log_dir = match &cli.command {
        Some(Commands::Import(_) | Commands::Copy(_) | Commands::Purge(_)) => {
            Some(config.logging.log_dir.as_path())
        }
        _ => None,
    };
    if let Some(path) = logging::init(cli.verbose, log_dir)? {
        tracing::debug!(path = %path.display(), "Logging to file");
    }

    let Some(command) = cli.command else {
        println!("issuer - import CSV issues into GitHub Projects");
        println!();
        println!("Use --help for usage information");
        return Ok(());
    };

    let token = if command.is_remote() {
        let secrets = Secrets::load()?;
        match secrets.github_token() {
            Some(token) => token,
            None => {
                tracing::error!(
                    "GitHub token not found. Set the GITHUB_TOKEN environment variable \
                     or add it to ~/.config/issuer/secrets.toml"
                );
                std::process::exit(1);
            }
        }
    } else {
        String::new()
    };

    let shutdown = shutdown::install();

    let result = match command {
        Commands::Import(args) => args.execute(&config, &token, shutdown).await,
        Commands::CsvSample(args) => args.execute(),
        Commands::Copy(args) => args.execute(&config, &token, shutdown).await,
        Commands::Purge(args) => args.execute(&config, &token, shutdown).await,
        Commands::Version => {
            println!("issuer {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Config { init_secrets } => {
            if init_secrets {
                let path = Secrets::create_template()?;
                println!("Created {}", path.display());
            }
            print_config(&config);
            Ok(())
        }
    };

    match result {
        Err(e)
            if matches!(
                e.downcast_ref::<issuer_github::Error>(),
                Some(issuer_github::Error::Interrupted)
            ) =>
        {
            tracing::warn!("Interrupted, exiting");
            Ok(())
        }
        other => other,
    }
}

fn print_config(config: &Config) {
    println!("issuer Configuration");
    println!("====================");
    println!();
    println!("API:");
    println!("  base_url: {}", config.api.base_url);
    println!("  user_agent: {}", config.api.user_agent);
    println!("  timeout: {:?}", config.api.timeout);
    println!();
    println!("Rate limit:");
    println!(
        "  {} requests per {:?}",
        config.rate_limit.max_requests, config.rate_limit.time_frame
    );
    println!("  throttle_floor: {:?}", config.rate_limit.throttle_floor);
    println!("  max_retries: {}", config.rate_limit.max_retries);
    println!();
    println!("Upload:");
    println!("  on_failure: {}", config.upload.on_failure);
    println!("  failure_delay: {:?}", config.upload.failure_delay);
    println!("  skip_existing: {}", config.upload.skip_existing);
    println!("  link_sub_issues: {}", config.upload.link_sub_issues);
    println!();
    println!("Fields:");
    println!("  estimate: {}", config.fields.estimate);
    println!("  issue_id: {}", config.fields.issue_id);
    println!("  status: {}", config.fields.status);
    println!("  iteration: {}", config.fields.iteration);
    println!("  target_date: {}", config.fields.target_date);
    println!();
    println!("Log directory: {}", config.logging.log_dir.display());
    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}
