//! perpliq CLI
//!
//! Operator tooling for the liquidation engine: runs liquidation passes over a
//! genesis state file and inspects margin, fillable prices and the book.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use console::style;

use commands::*;

/// perpliq liquidation engine CLI
#[derive(Parser)]
#[command(name = "perpliq")]
#[command(version)]
#[command(about = "Liquidation and deleveraging engine for perpetual futures", long_about = None)]
struct Cli {
    /// Genesis state file (JSON)
    #[arg(short, long, env = "PERPLIQ_STATE")]
    state: Option<String>,

    /// Output format (text, json)
    #[arg(short, long)]
    output: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one liquidation pass
    Liquidate {
        /// Subaccounts as owner/number; all liquidatable subaccounts when omitted
        subaccounts: Vec<String>,
        /// Start a new block at this height before the pass
        #[arg(long)]
        block_height: Option<u32>,
        /// Write the resulting state to this file
        #[arg(short, long)]
        write: Option<String>,
    },

    /// Show collateral and margin requirements of a subaccount
    Margin {
        /// Subaccount as owner/number
        subaccount: String,
    },

    /// Show the fillable price for a subaccount's position
    Fillable {
        /// Subaccount as owner/number
        subaccount: String,
        /// Perpetual id
        perpetual_id: u32,
    },

    /// Show the order book for a clob pair
    Book {
        /// Clob pair id
        clob_pair_id: u32,
        /// Levels per side
        #[arg(short, long, default_value = "10")]
        depth: usize,
    },

    /// Change the trading status of a clob pair (governance)
    SetStatus {
        /// Clob pair id
        clob_pair_id: u32,
        /// New status (active, paused, cancel-only, post-only)
        status: String,
        /// Signing authority
        #[arg(long)]
        authority: String,
        /// Write the resulting state to this file
        #[arg(short, long)]
        write: Option<String>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Initialize configuration file
    Init,
    /// Set the default genesis state file
    SetState {
        /// State file path
        path: String,
    },
    /// Set the default output format
    SetOutput {
        /// text or json
        format: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext::resolve(cli.state, cli.output.as_deref())?;

    if ctx.format.is_text() {
        println!(
            "{} {}",
            style("perpliq").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        );
    }

    match cli.command {
        Commands::Liquidate {
            subaccounts,
            block_height,
            write,
        } => handle_liquidate(&ctx, &subaccounts, block_height, write.as_deref()),
        Commands::Margin { subaccount } => handle_margin(&ctx, &subaccount),
        Commands::Fillable {
            subaccount,
            perpetual_id,
        } => handle_fillable(&ctx, &subaccount, perpetual_id),
        Commands::Book { clob_pair_id, depth } => handle_book(&ctx, clob_pair_id, depth),
        Commands::SetStatus {
            clob_pair_id,
            status,
            authority,
            write,
        } => handle_set_status(&ctx, clob_pair_id, &status, &authority, write.as_deref()),
        Commands::Config { command } => handle_config_command(&ctx, command),
    }
}
