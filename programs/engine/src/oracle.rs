//! Oracle prices frozen for the current block

use std::collections::BTreeMap;

use log::error;
use perpliq_common::*;

/// Price source consulted by the engine
pub trait PriceOracle {
    fn get_price(&self, market_id: u32) -> Result<MarketPrice>;
}

/// Prices as of the current block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceSnapshot {
    prices: BTreeMap<u32, MarketPrice>,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&mut self, price: MarketPrice) {
        self.prices.insert(price.id, price);
    }

    pub fn prices(&self) -> impl Iterator<Item = &MarketPrice> {
        self.prices.values()
    }
}

impl FromIterator<MarketPrice> for PriceSnapshot {
    fn from_iter<I: IntoIterator<Item = MarketPrice>>(iter: I) -> Self {
        let mut snapshot = PriceSnapshot::new();
        for price in iter {
            snapshot.set_price(price);
        }
        snapshot
    }
}

impl PriceOracle for PriceSnapshot {
    fn get_price(&self, market_id: u32) -> Result<MarketPrice> {
        self.prices.get(&market_id).copied().ok_or_else(|| {
            error!("oracle: no price for market {}", market_id);
            PerpliqError::MarketPriceNotFound(market_id)
        })
    }
}
