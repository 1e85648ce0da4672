//! Book header - sequencing and block metadata

use serde::{Deserialize, Serialize};

/// Book header tracking order sequencing and the current block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookHeader {
    /// Version (=1)
    pub version: u32,
    /// Sequence number (incremented on any book change)
    pub seqno: u64,
    /// Next order ID (monotonic, defines time priority)
    pub next_order_id: u64,
    /// Height of the block being processed
    pub block_height: u32,
    /// Number of resting orders
    pub order_count: u32,
    /// Total fills recorded since genesis
    pub fill_count: u64,
}

impl BookHeader {
    pub const VERSION: u32 = 1;

    pub fn new(block_height: u32) -> Self {
        Self {
            version: Self::VERSION,
            seqno: 0,
            next_order_id: 1,
            block_height,
            order_count: 0,
            fill_count: 0,
        }
    }

    /// Increment sequence number (on any book change)
    pub fn increment_seqno(&mut self) -> u64 {
        self.seqno = self.seqno.wrapping_add(1);
        self.seqno
    }

    /// Allocate next order ID
    pub fn next_order_id(&mut self) -> u64 {
        let id = self.next_order_id;
        self.next_order_id = self.next_order_id.wrapping_add(1);
        id
    }

    /// Make sure ids handed out later sort after an externally assigned one
    pub fn observe_order_id(&mut self, order_id: u64) {
        if order_id >= self.next_order_id {
            self.next_order_id = order_id.wrapping_add(1);
        }
    }
}

impl Default for BookHeader {
    fn default() -> Self {
        Self::new(0)
    }
}
