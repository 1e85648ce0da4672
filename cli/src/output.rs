//! Output formatting utilities

use anyhow::{anyhow, Result};
use console::style;
use serde::{Deserialize, Serialize};
use tabled::{settings::Style, Table, Tabled};

use perpliq_common::{ClobPair, Order, Side, SubaccountId, QUOTE_ATOMIC_RESOLUTION};
use perpliq_engine::{AccountOutcome, LiquidationReport, Risk, SkipReason};

use crate::config::Config;

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_text(self) -> bool {
        self == OutputFormat::Text
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Invalid output format: {}. Use 'text' or 'json'", s)),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// LIQUIDATION OUTPUT
// ============================================================================

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Subaccount")]
    subaccount: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Filled")]
    filled: u64,
    #[tabled(rename = "Deleveraged")]
    deleveraged: u64,
    #[tabled(rename = "Residual")]
    residual: u64,
    #[tabled(rename = "Fees")]
    fees: String,
    #[tabled(rename = "Insurance Paid")]
    insurance_paid: String,
}

fn outcome_row(id: &SubaccountId, outcome: &AccountOutcome) -> OutcomeRow {
    let mut row = OutcomeRow {
        subaccount: id.to_string(),
        outcome: String::new(),
        filled: 0,
        deleveraged: 0,
        residual: 0,
        fees: "-".to_string(),
        insurance_paid: "-".to_string(),
    };

    match outcome {
        AccountOutcome::Skipped(reason) => {
            row.outcome = match reason {
                SkipReason::NotLiquidatable => "not liquidatable",
                SkipReason::NotFound => "not found",
                SkipReason::NothingToLiquidate => "nothing to liquidate",
            }
            .to_string();
        }
        AccountOutcome::Liquidated(liquidation) => {
            row.outcome = format!("{}", style("liquidated").green());
            let mut fees = 0u128;
            let mut paid = 0u128;
            for p in &liquidation.positions {
                row.filled += p.filled_quantums;
                row.deleveraged += p.deleveraged_quantums();
                row.residual += p.residual_quantums;
                fees += p.fees();
                paid += p.insurance_paid();
            }
            row.fees = format_usd(fees as i128);
            row.insurance_paid = format_usd(paid as i128);
        }
        AccountOutcome::Failed(e) => {
            row.outcome = format!("{}", style(format!("failed: {}", e)).red());
        }
    }
    row
}

pub fn print_liquidation_report(report: &LiquidationReport, insurance_balance: u128) {
    println!(
        "\n{} {}",
        style("═══ Liquidation Pass: block").bold().cyan(),
        style(report.block_height).bold()
    );
    println!();

    if report.outcomes.is_empty() {
        println!("{}", style("No liquidatable subaccounts").dim());
        return;
    }

    let rows: Vec<OutcomeRow> = report
        .outcomes
        .iter()
        .map(|(id, outcome)| outcome_row(id, outcome))
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    println!();

    for (id, outcome) in &report.outcomes {
        if let AccountOutcome::Liquidated(liquidation) = outcome {
            for p in &liquidation.positions {
                if let Some(reason) = &p.residual_reason {
                    println!(
                        "{} {} perpetual {}: {} quantums left ({})",
                        style("!").yellow().bold(),
                        id,
                        p.perpetual_id,
                        p.residual_quantums,
                        reason
                    );
                }
            }
        }
    }

    println!("{}", style("─── Totals ───").dim());
    println!("{:<22} {:>15}", "Liquidated:", report.liquidated_count());
    println!("{:<22} {:>15}", "Fees Collected:", format_usd(report.fees_collected as i128));
    println!("{:<22} {:>15}", "Insurance Paid:", format_usd(report.insurance_paid as i128));
    println!("{:<22} {:>15}", "Insurance Balance:", format_usd(insurance_balance as i128));
    println!();
}

// ============================================================================
// RISK OUTPUT
// ============================================================================

pub fn print_margin(id: &SubaccountId, risk: &Risk) {
    println!("\n{} {}", style("═══ Margin:").bold().cyan(), style(id).bold());
    println!();
    println!("{:<22} {:>15}", "Net Collateral:", format_pnl(risk.net_collateral));
    println!("{:<22} {:>15}", "Initial Margin:", format_usd(risk.initial_margin as i128));
    println!("{:<22} {:>15}", "Maintenance Margin:", format_usd(risk.maintenance_margin as i128));
    println!();
    let status = if risk.is_bankrupt() {
        style("bankrupt").red().bold()
    } else if risk.is_liquidatable() {
        style("liquidatable").red()
    } else if !risk.is_initially_collateralized() {
        style("below initial margin").yellow()
    } else {
        style("healthy").green()
    };
    println!("{:<22} {:>15}", "Status:", status);
    println!();
}

pub fn print_fillable(
    id: &SubaccountId,
    perpetual_id: u32,
    side: Side,
    quantums: i128,
    rating_ppm: u128,
    subticks: u64,
) {
    println!(
        "\n{} {} perpetual {}",
        style("═══ Fillable Price:").bold().cyan(),
        style(id).bold(),
        perpetual_id
    );
    println!();
    println!("{:<22} {:>20}", "Position:", quantums);
    println!("{:<22} {:>20}", "Closing Side:", side);
    println!("{:<22} {:>19}%", "Bankruptcy Rating:", rating_ppm as f64 / 10_000.0);
    println!("{:<22} {:>20}", "Fillable Subticks:", subticks);
    println!();
}

// ============================================================================
// BOOK OUTPUT
// ============================================================================

#[derive(Tabled)]
struct OrderRow {
    #[tabled(rename = "Id")]
    order_id: u64,
    #[tabled(rename = "Side")]
    side: Side,
    #[tabled(rename = "Subticks")]
    subticks: u64,
    #[tabled(rename = "Quantums")]
    quantums: u64,
    #[tabled(rename = "Subaccount")]
    subaccount: String,
    #[tabled(rename = "Good Til")]
    good_til_block: u32,
}

impl From<&Order> for OrderRow {
    fn from(o: &Order) -> Self {
        Self {
            order_id: o.order_id,
            side: o.side,
            subticks: o.subticks,
            quantums: o.quantums,
            subaccount: o.subaccount_id.to_string(),
            good_til_block: o.good_til_block,
        }
    }
}

pub fn print_book(pair: &ClobPair, bids: &[Order], asks: &[Order]) {
    println!(
        "\n{} {} ({})",
        style("═══ Order Book: clob pair").bold().cyan(),
        style(pair.id).bold(),
        pair.status
    );
    println!();

    if bids.is_empty() && asks.is_empty() {
        println!("{}", style("(No orders in book)").dim());
        return;
    }

    // Asks best-last so the spread sits in the middle
    let rows: Vec<OrderRow> = asks
        .iter()
        .rev()
        .chain(bids.iter())
        .map(OrderRow::from)
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    println!();
}

// ============================================================================
// CONFIG OUTPUT
// ============================================================================

pub fn print_config(config: &Config, path: &std::path::Path) {
    println!("\n{}", style("═══ Configuration ═══").bold().cyan());
    println!();
    println!("{:<16} {}", "File:", path.display());
    println!(
        "{:<16} {}",
        "State:",
        config.state_path.as_deref().unwrap_or("(not set)")
    );
    println!("{:<16} {:?}", "Output:", config.output_format);
    println!();
}

// ============================================================================
// FORMATTING HELPERS
// ============================================================================

/// Quote quantums as dollars
fn format_usd(quantums: i128) -> String {
    let amount = quantums as f64 * 10f64.powi(QUOTE_ATOMIC_RESOLUTION);
    let sign = if amount < 0.0 { "-" } else { "" };
    let abs = amount.abs();
    if abs >= 1_000_000.0 {
        format!("{}${:.2}M", sign, abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{}${:.2}K", sign, abs / 1_000.0)
    } else {
        format!("{}${:.2}", sign, abs)
    }
}

fn format_pnl(quantums: i128) -> String {
    let formatted = format_usd(quantums.abs());
    if quantums >= 0 {
        format!("{}", style(format!("+{}", formatted)).green())
    } else {
        format!("{}", style(format!("-{}", formatted)).red())
    }
}
