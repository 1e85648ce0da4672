//! Order book state: clob pairs, resting orders and the fill log

use std::collections::{BTreeMap, VecDeque};

use log::debug;
use perpliq_common::*;
use serde::{Deserialize, Serialize};

use super::header::BookHeader;
use super::pools::{Pool, INVALID_INDEX};
use crate::matching::Fill;

/// Maximum number of fills kept in the log
pub const MAX_FILL_LOG: usize = 10_000;

/// Resting order plus its intrusive price-level links
#[derive(Debug, Clone)]
pub struct BookEntry {
    pub order: Order,
    pub prev: u32,
    pub next: u32,
}

/// List heads for one clob pair
#[derive(Debug, Clone, Copy)]
pub struct PairHeads {
    pub bids_head: u32,
    pub asks_head: u32,
}

impl PairHeads {
    fn empty() -> Self {
        Self {
            bids_head: INVALID_INDEX,
            asks_head: INVALID_INDEX,
        }
    }

    pub(crate) fn head_mut(&mut self, side: Side) -> &mut u32 {
        match side {
            Side::Buy => &mut self.bids_head,
            Side::Sell => &mut self.asks_head,
        }
    }

    pub(crate) fn head(&self, side: Side) -> u32 {
        match side {
            Side::Buy => self.bids_head,
            Side::Sell => self.asks_head,
        }
    }
}

/// Fill as recorded in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRecord {
    /// Book sequence number at the time of the fill
    pub seqno: u64,
    pub block_height: u32,
    pub fill: Fill,
}

/// Order book for all clob pairs
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub header: BookHeader,
    clob_pairs: BTreeMap<u32, ClobPair>,
    pub(crate) heads: BTreeMap<u32, PairHeads>,
    pub(crate) orders: Pool<BookEntry>,
    /// order_id -> arena index
    pub(crate) index: BTreeMap<u64, u32>,
    fills: VecDeque<FillRecord>,
}

impl OrderBook {
    pub fn new(block_height: u32) -> Self {
        Self {
            header: BookHeader::new(block_height),
            ..Default::default()
        }
    }

    /// Register a clob pair
    pub fn add_clob_pair(&mut self, pair: ClobPair) -> Result<()> {
        pair.validate()?;
        if self.clob_pairs.contains_key(&pair.id) {
            return Err(PerpliqError::InvalidConfig(format!(
                "duplicate clob pair id {}",
                pair.id
            )));
        }
        self.heads.insert(pair.id, PairHeads::empty());
        self.clob_pairs.insert(pair.id, pair);
        Ok(())
    }

    pub fn clob_pair(&self, id: u32) -> Option<&ClobPair> {
        self.clob_pairs.get(&id)
    }

    pub fn clob_pair_mut(&mut self, id: u32) -> Option<&mut ClobPair> {
        self.clob_pairs.get_mut(&id)
    }

    /// Clob pairs in id order
    pub fn clob_pairs(&self) -> impl Iterator<Item = &ClobPair> {
        self.clob_pairs.values()
    }

    pub fn get_order(&self, order_id: u64) -> Option<&Order> {
        let idx = *self.index.get(&order_id)?;
        self.orders.get(idx).map(|e| &e.order)
    }

    /// Number of resting orders
    pub fn order_count(&self) -> u32 {
        self.orders.used()
    }

    /// Advance to a new block
    pub fn begin_block(&mut self, block_height: u32) {
        debug!("book: begin block {}", block_height);
        self.header.block_height = block_height;
    }

    pub fn block_height(&self) -> u32 {
        self.header.block_height
    }

    /// Append a fill to the log, evicting the oldest when full
    pub fn record_fill(&mut self, fill: Fill) {
        let seqno = self.header.increment_seqno();
        if self.fills.len() == MAX_FILL_LOG {
            self.fills.pop_front();
        }
        self.fills.push_back(FillRecord {
            seqno,
            block_height: self.header.block_height,
            fill,
        });
        self.header.fill_count = self.header.fill_count.wrapping_add(1);
    }

    /// Fill log, oldest first
    pub fn fills(&self) -> impl Iterator<Item = &FillRecord> {
        self.fills.iter()
    }
}
