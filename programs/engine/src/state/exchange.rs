//! Exchange state passed explicitly to every operation

use log::{debug, info};
use perpliq_clob::OrderBook;
use perpliq_common::*;

use super::{BlockState, InsuranceFund, MarketRegistry, SubaccountLedger, SubaccountStore};
use crate::oracle::PriceSnapshot;
use crate::risk::{margin_requirements, Risk};

/// Everything the liquidation engine reads and mutates within a block
#[derive(Debug, Clone, Default)]
pub struct ExchangeState {
    pub book: OrderBook,
    pub markets: MarketRegistry,
    pub oracle: PriceSnapshot,
    pub ledger: SubaccountLedger,
    pub insurance: InsuranceFund,
    pub block: BlockState,
    pub config: LiquidationsConfig,
    /// Governance authority allowed to change clob pair status
    pub authority: String,
}

impl ExchangeState {
    pub fn new(authority: impl Into<String>, config: LiquidationsConfig, block_height: u32) -> Self {
        Self {
            book: OrderBook::new(block_height),
            block: BlockState::new(block_height),
            config,
            authority: authority.into(),
            ..Default::default()
        }
    }

    pub fn block_height(&self) -> u32 {
        self.block.height
    }

    /// Start a new block: reset per-block limits and drop expired orders
    pub fn begin_block(&mut self, block_height: u32) -> Result<()> {
        self.block.begin(block_height);
        self.book.begin_block(block_height);
        let expired = self.book.expire_orders(block_height)?;
        info!(
            "begin block {}: {} expired orders removed",
            block_height,
            expired.len()
        );
        Ok(())
    }

    /// Register a clob pair with both the book and the market registry
    pub fn add_clob_pair(&mut self, pair: ClobPair) -> Result<()> {
        self.markets.perpetual(pair.perpetual_id)?;
        self.markets.register_clob_pair(pair.perpetual_id, pair.id)?;
        debug!("registered clob pair {} for perpetual {}", pair.id, pair.perpetual_id);
        self.book.add_clob_pair(pair)
    }

    /// Current collateral and margin of a subaccount
    pub fn risk(&self, id: &SubaccountId) -> Result<Risk> {
        let subaccount = self
            .ledger
            .get(id)
            .ok_or_else(|| PerpliqError::SubaccountNotFound(id.to_string()))?;
        margin_requirements(&self.markets, &self.oracle, subaccount)
    }
}
