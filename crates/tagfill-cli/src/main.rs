//! # tagfill
//!
//! Command-line interface for symbolic state test fillers.
//!
//! ## Usage
//!
//! ```bash
//! # Rewrite literal addresses in legacy fillers into tags
//! tagfill convert tests/static --dry-run
//! tagfill convert tests/static/stExample/addFiller.yml --convert-coinbase
//!
//! # Resolve fillers into concrete vectors
//! tagfill fill tests/static/stExample --fork Cancun --out fixtures/
//!
//! # Configuration (~/.tagfill/config.toml)
//! tagfill config --show
//! tagfill config --set-solc /opt/solc
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod error;
mod output;

pub use config::Config;
pub use error::CliError;
pub use output::Output;

/// Tag and fill static state tests
#[derive(Parser, Debug)]
#[command(name = "tagfill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Rewrite literal addresses in legacy fillers into tags
    Convert(commands::convert::ConvertCommand),
    /// Resolve fillers into concrete test vectors
    Fill(commands::fill::FillCommand),
    /// Show or edit configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Set the YUL compiler binary
        #[arg(long)]
        set_solc: Option<PathBuf>,
        /// Set the LLL compiler binary
        #[arg(long)]
        set_lllc: Option<PathBuf>,
        /// Set the default fork
        #[arg(long)]
        set_fork: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::load();

    let result = match cli.command {
        Commands::Convert(cmd) => cmd.execute(&config, cli.json),
        Commands::Fill(cmd) => cmd.execute(&config, cli.json),
        Commands::Config {
            show,
            set_solc,
            set_lllc,
            set_fork,
        } => handle_config(&mut config, show, set_solc, set_lllc, set_fork, cli.json),
    };

    if let Err(e) = result {
        if cli.json {
            println!(
                "{}",
                serde_json::json!({
                    "error": e.to_string(),
                    "success": false
                })
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn handle_config(
    config: &mut Config,
    show: bool,
    set_solc: Option<PathBuf>,
    set_lllc: Option<PathBuf>,
    set_fork: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let mut modified = false;

    if let Some(solc) = set_solc {
        config.solc = solc;
        modified = true;
    }
    if let Some(lllc) = set_lllc {
        config.lllc = lllc;
        modified = true;
    }
    if let Some(fork) = set_fork {
        if !tagfill_filler::FORKS.contains(&fork.as_str()) {
            return Err(CliError::InvalidInput(format!("unknown fork {}", fork)));
        }
        config.default_fork = Some(fork);
        modified = true;
    }

    if modified {
        config.save()?;
        Output::new(json)
            .field("status", "saved")
            .line("Configuration saved")
            .print();
    } else if show {
        let solc = config.solc.display().to_string();
        let lllc = config.lllc.display().to_string();
        let fork = config.default_fork.clone().unwrap_or_else(|| "all".to_string());
        Output::new(json)
            .field("solc", &solc)
            .field("lllc", &lllc)
            .field_value("convert_coinbase", config.convert_coinbase.into())
            .field("default_fork", &fork)
            .line(format!("solc: {}", solc))
            .line(format!("lllc: {}", lllc))
            .line(format!("convert_coinbase: {}", config.convert_coinbase))
            .line(format!("default_fork: {}", fork))
            .print();
    } else {
        Output::new(json)
            .line("Use --show to display config, or --set-solc/--set-lllc/--set-fork to modify")
            .print();
    }

    Ok(())
}
