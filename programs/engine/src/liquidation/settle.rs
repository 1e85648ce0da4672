//! Settlement of liquidation fills
//!
//! Every fill moves the position and the quote from the liquidated subaccount to
//! the maker in one ledger update. The difference between the fill quote and the
//! bankruptcy quote goes to the insurance fund: a surplus pays the liquidation
//! fee, a shortfall is covered by the fund within its per-block budget.

use log::{debug, info, warn};
use perpliq_clob::{Fill, FillOutcome, FillProcessor, HaltReason};
use perpliq_common::*;
use serde::{Deserialize, Serialize};

use crate::oracle::PriceOracle;
use crate::risk::{bankruptcy_quote_quantums, margin_requirements, margin_requirements_after, net_notional};
use crate::state::{
    BlockState, InsuranceEventType, InsuranceFund, MarketRegistry, SubaccountLedger,
    SubaccountStore, SubaccountUpdate,
};

/// A fill together with its insurance accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledFill {
    pub fill: Fill,
    /// Quote quantums received by the liquidated subaccount before fees
    pub quote_quantums: i128,
    /// Quote quantums at which the slice leaves zero equity
    pub bankruptcy_quote_quantums: i128,
    /// Fill quote minus bankruptcy quote
    pub insurance_delta: i128,
    /// Fee credited to the insurance fund
    pub fee: u128,
    /// Shortfall paid by the insurance fund
    pub insurance_paid: u128,
}

/// Liquidation fee for a fill: the surplus over bankruptcy, capped by the
/// configured fraction of the fill's quote value
pub fn liquidation_fee(insurance_delta: i128, fill_quote: u128, max_liquidation_fee_ppm: u32) -> Result<u128> {
    if insurance_delta <= 0 {
        return Ok(0);
    }
    let max_fee = mul_ppm_floor(fill_quote, max_liquidation_fee_ppm as u64)?;
    Ok((insurance_delta as u128).min(max_fee))
}

/// Fill processor used while matching liquidation orders
pub struct LiquidationFillProcessor<'a> {
    pub ledger: &'a mut SubaccountLedger,
    pub insurance: &'a mut InsuranceFund,
    pub block: &'a mut BlockState,
    pub markets: &'a MarketRegistry,
    pub oracle: &'a dyn PriceOracle,
    pub config: &'a LiquidationsConfig,
    pub settled: Vec<SettledFill>,
    /// Shortfall of the fill that halted matching on the fund balance
    pub uncovered_shortfall: Option<u128>,
}

impl<'a> LiquidationFillProcessor<'a> {
    /// Maker would end below initial margin on a trade that increases its requirement
    fn maker_rejects(&self, maker: &Subaccount, perpetual_id: u32, maker_delta: i128, maker_quote: i128) -> Result<bool> {
        let before = margin_requirements(self.markets, self.oracle, maker)?;
        let after = margin_requirements_after(
            self.markets,
            self.oracle,
            maker,
            Some((perpetual_id, maker_delta)),
            maker_quote,
        )?;
        Ok(!after.is_initially_collateralized() && after.initial_margin > before.initial_margin)
    }
}

impl<'a> FillProcessor for LiquidationFillProcessor<'a> {
    fn process_fill(&mut self, fill: &Fill, clob_pair: &ClobPair) -> Result<FillOutcome> {
        let perpetual_id = fill.perpetual_id;
        let funding_index = self.markets.perpetual(perpetual_id)?.funding_index;

        let taker = self
            .ledger
            .get(&fill.taker)
            .cloned()
            .ok_or_else(|| PerpliqError::LedgerInvariant(format!("liquidated subaccount {} vanished", fill.taker)))?;

        let delta = fill.taker_side.signed(fill.quantums);
        let fill_quote = fill_quote_quantums(fill.quantums, fill.subticks, clob_pair.quantum_conversion_exponent)?;
        let fill_quote_signed = i128::try_from(fill_quote).map_err(|_| PerpliqError::Overflow)?;
        let taker_quote = match fill.taker_side {
            Side::Buy => -fill_quote_signed,
            Side::Sell => fill_quote_signed,
        };

        let maker = match self.ledger.get(&fill.maker) {
            Some(m) => m.clone(),
            None => {
                warn!("settle: maker {} has no subaccount", fill.maker);
                return Ok(FillOutcome::MakerRejected);
            }
        };
        if self.maker_rejects(&maker, perpetual_id, -delta, -taker_quote)? {
            return Ok(FillOutcome::MakerRejected);
        }

        let fill_notional = net_notional(self.markets, self.oracle, perpetual_id, delta)?.unsigned_abs();
        let limits = &self.config.subaccount_block_limits;
        if fill_notional > self.block.remaining_notional(&fill.taker, limits) {
            return Ok(FillOutcome::Halt(HaltReason::NotionalLimit));
        }

        let bankruptcy = bankruptcy_quote_quantums(self.markets, self.oracle, &taker, perpetual_id, delta)?;
        let insurance_delta = taker_quote
            .checked_sub(bankruptcy)
            .ok_or(PerpliqError::Overflow)?;

        let (fee, shortfall) = if insurance_delta < 0 {
            let shortfall = insurance_delta.unsigned_abs();
            if !self.insurance.can_cover(shortfall) {
                debug!(
                    "settle: fund balance {} cannot cover {} for {}",
                    self.insurance.balance, shortfall, fill.taker
                );
                self.uncovered_shortfall = Some(shortfall);
                return Ok(FillOutcome::Halt(HaltReason::InsuranceFundInsufficient));
            }
            if !self.block.can_lose_insurance(&fill.taker, shortfall, limits) {
                debug!("settle: insurance loss budget spent for {}", fill.taker);
                return Ok(FillOutcome::Halt(HaltReason::InsuranceLossLimit));
            }
            (0, shortfall)
        } else {
            (
                liquidation_fee(insurance_delta, fill_quote, self.config.max_liquidation_fee_ppm)?,
                0,
            )
        };

        // Fund receives the fee, or pays the shortfall so the taker ends at bankruptcy.
        let fund_transfer = fee as i128 - shortfall as i128;
        let taker_update = SubaccountUpdate::quote(fill.taker.clone(), taker_quote - fund_transfer)
            .with_position(perpetual_id, delta, funding_index);
        let maker_update = SubaccountUpdate::quote(fill.maker.clone(), -taker_quote)
            .with_position(perpetual_id, -delta, funding_index);
        self.ledger.apply(&[taker_update, maker_update])?;

        let height = self.block.height;
        if fee > 0 {
            self.insurance.contribute(
                fee,
                InsuranceEventType::LiquidationFee,
                Some(&fill.taker),
                Some(perpetual_id),
                height,
            )?;
        }
        if shortfall > 0 {
            self.insurance.payout(shortfall, &fill.taker, perpetual_id, height)?;
            self.block
                .add_insurance_lost(&fill.taker, shortfall, &self.config.subaccount_block_limits)?;
        }
        self.block.add_notional_liquidated(&fill.taker, fill_notional);

        info!(
            "settle: {} {} {} @ {} against {} (fee {}, insurance paid {})",
            fill.taker, fill.taker_side, fill.quantums, fill.subticks, fill.maker, fee, shortfall
        );

        self.settled.push(SettledFill {
            fill: fill.clone(),
            quote_quantums: taker_quote,
            bankruptcy_quote_quantums: bankruptcy,
            insurance_delta,
            fee,
            insurance_paid: shortfall,
        });
        Ok(FillOutcome::Accepted)
    }
}
