//! Genesis document: a JSON description of the full exchange state

use std::collections::BTreeSet;

use log::info;
use perpliq_common::*;
use serde::{Deserialize, Serialize};

use crate::oracle::PriceSnapshot;
use crate::state::{ExchangeState, InsuranceEventType, InsuranceFund};

fn default_liquidations_config() -> LiquidationsConfig {
    LiquidationsConfig::standard()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    #[serde(default)]
    pub block_height: u32,
    /// Governance authority
    pub authority: String,
    #[serde(default = "default_liquidations_config")]
    pub liquidations_config: LiquidationsConfig,
    pub liquidity_tiers: Vec<LiquidityTier>,
    pub perpetuals: Vec<Perpetual>,
    #[serde(default)]
    pub market_prices: Vec<MarketPrice>,
    pub clob_pairs: Vec<ClobPair>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub subaccounts: Vec<Subaccount>,
    #[serde(default)]
    pub insurance_fund_balance: u128,
}

impl GenesisState {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PerpliqError::InvalidConfig(format!("genesis: {}", e)))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PerpliqError::InvalidConfig(format!("genesis: {}", e)))
    }

    /// Validate and build the exchange state
    pub fn into_state(self) -> Result<ExchangeState> {
        self.liquidations_config.validate()?;
        if self.authority.is_empty() {
            return Err(PerpliqError::InvalidConfig("genesis: empty authority".to_string()));
        }

        let mut state = ExchangeState::new(self.authority, self.liquidations_config, self.block_height);

        for tier in self.liquidity_tiers {
            state.markets.add_liquidity_tier(tier)?;
        }
        for perpetual in self.perpetuals {
            state.markets.add_perpetual(perpetual)?;
        }
        state.oracle = self.market_prices.into_iter().collect::<PriceSnapshot>();
        for pair in self.clob_pairs {
            state.add_clob_pair(pair)?;
        }

        let mut seen = BTreeSet::new();
        for subaccount in self.subaccounts {
            if !seen.insert(subaccount.id.clone()) {
                return Err(PerpliqError::InvalidConfig(format!(
                    "genesis: duplicate subaccount {}",
                    subaccount.id
                )));
            }
            state.ledger.insert(subaccount);
        }

        for order in self.orders {
            if !state.ledger.contains(&order.subaccount_id) {
                return Err(PerpliqError::InvalidConfig(format!(
                    "genesis: order for unknown subaccount {}",
                    order.subaccount_id
                )));
            }
            state.book.place_order(order)?;
        }

        state.insurance = InsuranceFund::new(0);
        if self.insurance_fund_balance > 0 {
            state.insurance.contribute(
                self.insurance_fund_balance,
                InsuranceEventType::Deposit,
                None,
                None,
                self.block_height,
            )?;
        }

        info!(
            "genesis: {} subaccounts, {} clob pairs, {} resting orders at height {}",
            state.ledger.len(),
            state.book.clob_pairs().count(),
            state.book.order_count(),
            self.block_height
        );
        Ok(state)
    }

    /// Snapshot an exchange state as a genesis document
    pub fn export(state: &ExchangeState) -> Result<Self> {
        let mut orders = Vec::new();
        for pair in state.book.clob_pairs() {
            for side in [Side::Buy, Side::Sell] {
                orders.extend(state.book.orders_on_side(pair.id, side)?.cloned());
            }
        }

        Ok(Self {
            block_height: state.block_height(),
            authority: state.authority.clone(),
            liquidations_config: state.config,
            liquidity_tiers: state.markets.liquidity_tiers().cloned().collect(),
            perpetuals: state.markets.perpetuals().cloned().collect(),
            market_prices: state.oracle.prices().copied().collect(),
            clob_pairs: state.book.clob_pairs().cloned().collect(),
            orders,
            subaccounts: state.ledger.iter().cloned().collect(),
            insurance_fund_balance: state.insurance.balance,
        })
    }
}

impl ExchangeState {
    pub fn from_genesis(genesis: GenesisState) -> Result<Self> {
        genesis.into_state()
    }
}
