//! CLI Command Handlers

use anyhow::{anyhow, bail, Context, Result};
use console::style;
use log::info;
use serde_json::json;
use std::fs;

use perpliq_common::*;
use perpliq_engine::{
    adjusted_bankruptcy_rating_ppm, fillable_price_subticks, liquidatable_subaccounts,
    margin_requirements, position_risk, process_liquidate_subaccounts,
    process_set_clob_pair_status, ExchangeState, GenesisState, SubaccountStore,
};

use crate::config::Config;
use crate::output::*;
use crate::ConfigCommands;

/// Settings shared by every command
pub struct CliContext {
    pub config: Config,
    pub state_path: Option<String>,
    pub format: OutputFormat,
}

impl CliContext {
    /// Merge command-line flags over the saved configuration
    pub fn resolve(state: Option<String>, output: Option<&str>) -> Result<Self> {
        let config = Config::load()?;
        let format = match output {
            Some(s) => s.parse()?,
            None => config.output_format,
        };
        let state_path = state.or_else(|| config.state_path.clone());
        Ok(Self {
            config,
            state_path,
            format,
        })
    }

    fn state_path(&self) -> Result<&str> {
        self.state_path
            .as_deref()
            .ok_or_else(|| anyhow!("No state file specified. Use --state or 'perpliq config set-state'"))
    }

    /// Read and validate the genesis state file
    fn load_state(&self) -> Result<ExchangeState> {
        let path = self.state_path()?;
        let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        let genesis = GenesisState::from_json(&contents).with_context(|| format!("loading {}", path))?;
        let state = ExchangeState::from_genesis(genesis).with_context(|| format!("validating {}", path))?;
        info!("loaded state from {} at height {}", path, state.block_height());
        Ok(state)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn parse_subaccount(s: &str) -> Result<SubaccountId> {
    s.parse::<SubaccountId>()
        .with_context(|| format!("Invalid subaccount '{}'. Use owner/number", s))
}

fn write_state(state: &ExchangeState, path: &str) -> Result<()> {
    let json = GenesisState::export(state)?.to_json_pretty()?;
    fs::write(path, json).with_context(|| format!("writing {}", path))?;
    info!("wrote state to {}", path);
    Ok(())
}

// ============================================================================
// LIQUIDATION COMMANDS
// ============================================================================

pub fn handle_liquidate(
    ctx: &CliContext,
    subaccounts: &[String],
    block_height: Option<u32>,
    write: Option<&str>,
) -> Result<()> {
    let mut state = ctx.load_state()?;
    if let Some(height) = block_height {
        state.begin_block(height)?;
    }

    let ids = if subaccounts.is_empty() {
        liquidatable_subaccounts(&state)?
    } else {
        subaccounts
            .iter()
            .map(|s| parse_subaccount(s))
            .collect::<Result<Vec<_>>>()?
    };

    let report = process_liquidate_subaccounts(&mut state, &ids)?;

    match ctx.format {
        OutputFormat::Text => print_liquidation_report(&report, state.insurance.balance),
        OutputFormat::Json => print_json(&report)?,
    }

    if let Some(path) = write {
        write_state(&state, path)?;
        if ctx.format.is_text() {
            println!("{}", style(format!("State written to {}", path)).green());
        }
    }
    Ok(())
}

// ============================================================================
// INSPECTION COMMANDS
// ============================================================================

pub fn handle_margin(ctx: &CliContext, subaccount: &str) -> Result<()> {
    let state = ctx.load_state()?;
    let id = parse_subaccount(subaccount)?;
    let risk = state.risk(&id)?;

    match ctx.format {
        OutputFormat::Text => print_margin(&id, &risk),
        OutputFormat::Json => print_json(&json!({
            "subaccount": id,
            "risk": risk,
            "liquidatable": risk.is_liquidatable(),
        }))?,
    }
    Ok(())
}

pub fn handle_fillable(ctx: &CliContext, subaccount: &str, perpetual_id: u32) -> Result<()> {
    let state = ctx.load_state()?;
    let id = parse_subaccount(subaccount)?;
    let sub = state
        .ledger
        .get(&id)
        .ok_or_else(|| anyhow!("Subaccount {} not found", id))?;

    let quantums = sub.position_quantums(perpetual_id);
    if quantums == 0 {
        bail!("{} has no position in perpetual {}", id, perpetual_id);
    }

    let position = position_risk(&state.markets, &state.oracle, perpetual_id, quantums)?;
    let risk = margin_requirements(&state.markets, &state.oracle, sub)?;
    let clob_pair_id = state.markets.clob_pair_id_for(perpetual_id)?;
    let pair = state
        .book
        .clob_pair(clob_pair_id)
        .ok_or(PerpliqError::ClobPairNotFound(clob_pair_id))?;

    let fillable = &state.config.fillable_price_config;
    let rating = adjusted_bankruptcy_rating_ppm(fillable, &risk);
    let subticks = fillable_price_subticks(fillable, pair, &position, &risk)?;
    let side = Side::closing(quantums);

    match ctx.format {
        OutputFormat::Text => print_fillable(&id, perpetual_id, side, quantums, rating, subticks),
        OutputFormat::Json => print_json(&json!({
            "subaccount": id,
            "perpetual_id": perpetual_id,
            "clob_pair_id": clob_pair_id,
            "side": side,
            "quantums": quantums,
            "adjusted_bankruptcy_rating_ppm": rating,
            "fillable_price_subticks": subticks,
        }))?,
    }
    Ok(())
}

pub fn handle_book(ctx: &CliContext, clob_pair_id: u32, depth: usize) -> Result<()> {
    let state = ctx.load_state()?;
    let pair = state
        .book
        .clob_pair(clob_pair_id)
        .ok_or(PerpliqError::ClobPairNotFound(clob_pair_id))?;

    let bids: Vec<Order> = state
        .book
        .orders_on_side(clob_pair_id, Side::Buy)?
        .take(depth)
        .cloned()
        .collect();
    let asks: Vec<Order> = state
        .book
        .orders_on_side(clob_pair_id, Side::Sell)?
        .take(depth)
        .cloned()
        .collect();

    match ctx.format {
        OutputFormat::Text => print_book(pair, &bids, &asks),
        OutputFormat::Json => print_json(&json!({
            "clob_pair": pair,
            "bids": bids,
            "asks": asks,
        }))?,
    }
    Ok(())
}

// ============================================================================
// GOVERNANCE COMMANDS
// ============================================================================

pub fn handle_set_status(
    ctx: &CliContext,
    clob_pair_id: u32,
    status: &str,
    authority: &str,
    write: Option<&str>,
) -> Result<()> {
    let mut state = ctx.load_state()?;
    let status: ClobPairStatus = status.parse()?;
    process_set_clob_pair_status(&mut state, authority, clob_pair_id, status)?;

    match ctx.format {
        OutputFormat::Text => println!(
            "{}",
            style(format!("Clob pair {} is now {}", clob_pair_id, status)).green()
        ),
        OutputFormat::Json => print_json(&json!({
            "clob_pair_id": clob_pair_id,
            "status": status,
        }))?,
    }

    if let Some(path) = write {
        write_state(&state, path)?;
    }
    Ok(())
}

// ============================================================================
// CONFIG COMMANDS
// ============================================================================

pub fn handle_config_command(ctx: &CliContext, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            print_config(&ctx.config, &Config::config_path());
        }

        ConfigCommands::Init => {
            let config = Config::default();
            config.save()?;
            println!(
                "{}",
                style(format!("Configuration written to {}", Config::config_path().display())).green()
            );
        }

        ConfigCommands::SetState { path } => {
            let mut config = ctx.config.clone();
            config.state_path = Some(path.clone());
            config.save()?;
            println!("{}", style(format!("State file set to {}", path)).green());
        }

        ConfigCommands::SetOutput { format } => {
            let mut config = ctx.config.clone();
            config.output_format = format.parse()?;
            config.save()?;
            println!("{}", style(format!("Output format set to {}", format)).green());
        }
    }
    Ok(())
}
