//! Order book management with price-time priority

use log::debug;
use perpliq_common::*;

use crate::state::{OrderBook, BookEntry, INVALID_INDEX};

impl OrderBook {
    /// Insert order into book maintaining price-time priority
    fn link_order(&mut self, order_idx: u32) -> Result<()> {
        let (clob_pair_id, side, price, order_id) = {
            let entry = self
                .orders
                .get(order_idx)
                .ok_or(PerpliqError::LedgerInvariant(format!("dangling order slot {}", order_idx)))?;
            (
                entry.order.clob_pair_id,
                entry.order.side,
                entry.order.subticks,
                entry.order.order_id,
            )
        };

        let head = self
            .heads
            .get(&clob_pair_id)
            .ok_or(PerpliqError::ClobPairNotFound(clob_pair_id))?
            .head(side);

        // Find insertion point maintaining price-time priority
        let mut curr_idx = head;
        let mut prev_idx = INVALID_INDEX;

        while curr_idx != INVALID_INDEX {
            let curr = self
                .orders
                .get(curr_idx)
                .ok_or(PerpliqError::LedgerInvariant(format!("dangling order slot {}", curr_idx)))?;

            // Buy: higher price first, then earlier order_id
            // Sell: lower price first, then earlier order_id
            let should_insert_before = match side {
                Side::Buy => {
                    price > curr.order.subticks
                        || (price == curr.order.subticks && order_id < curr.order.order_id)
                }
                Side::Sell => {
                    price < curr.order.subticks
                        || (price == curr.order.subticks && order_id < curr.order.order_id)
                }
            };

            if should_insert_before {
                break;
            }

            prev_idx = curr_idx;
            curr_idx = curr.next;
        }

        if let Some(entry) = self.orders.get_mut(order_idx) {
            entry.next = curr_idx;
            entry.prev = prev_idx;
        }

        if prev_idx == INVALID_INDEX {
            if let Some(heads) = self.heads.get_mut(&clob_pair_id) {
                *heads.head_mut(side) = order_idx;
            }
        } else if let Some(prev) = self.orders.get_mut(prev_idx) {
            prev.next = order_idx;
        }

        if curr_idx != INVALID_INDEX {
            if let Some(curr) = self.orders.get_mut(curr_idx) {
                curr.prev = order_idx;
            }
        }

        self.header.increment_seqno();
        Ok(())
    }

    /// Unlink an order from its price level and release its slot
    fn unlink_order(&mut self, order_idx: u32) -> Result<Order> {
        let (clob_pair_id, side, prev, next) = {
            let entry = self
                .orders
                .get(order_idx)
                .ok_or(PerpliqError::LedgerInvariant(format!("dangling order slot {}", order_idx)))?;
            (entry.order.clob_pair_id, entry.order.side, entry.prev, entry.next)
        };

        if prev == INVALID_INDEX {
            if let Some(heads) = self.heads.get_mut(&clob_pair_id) {
                *heads.head_mut(side) = next;
            }
        } else if let Some(prev_entry) = self.orders.get_mut(prev) {
            prev_entry.next = next;
        }

        if next != INVALID_INDEX {
            if let Some(next_entry) = self.orders.get_mut(next) {
                next_entry.prev = prev;
            }
        }

        let entry = self
            .orders
            .free(order_idx)
            .ok_or(PerpliqError::LedgerInvariant(format!("dangling order slot {}", order_idx)))?;
        self.index.remove(&entry.order.order_id);
        self.header.order_count = self.header.order_count.saturating_sub(1);
        self.header.increment_seqno();
        Ok(entry.order)
    }

    /// Place a resting order. An `order_id` of zero is assigned the next sequence.
    pub fn place_order(&mut self, mut order: Order) -> Result<u64> {
        let pair = self
            .clob_pair(order.clob_pair_id)
            .ok_or(PerpliqError::ClobPairNotFound(order.clob_pair_id))?;

        if order.time_in_force == TimeInForce::ImmediateOrCancel {
            return Err(PerpliqError::InvalidOrder(
                "immediate-or-cancel orders never rest".to_string(),
            ));
        }
        if order.quantums == 0 || !is_step_aligned(order.quantums, pair.step_base_quantums) {
            return Err(PerpliqError::InvalidOrder(format!(
                "quantums {} not a positive multiple of step {}",
                order.quantums, pair.step_base_quantums
            )));
        }
        if order.subticks == 0 || order.subticks % pair.subticks_per_tick != 0 {
            return Err(PerpliqError::InvalidOrder(format!(
                "subticks {} not a positive multiple of tick {}",
                order.subticks, pair.subticks_per_tick
            )));
        }

        if order.order_id == 0 {
            order.order_id = self.header.next_order_id();
        } else if self.index.contains_key(&order.order_id) {
            return Err(PerpliqError::DuplicateOrder(order.order_id));
        } else {
            self.header.observe_order_id(order.order_id);
        }

        let order_id = order.order_id;
        let idx = self
            .orders
            .alloc(BookEntry {
                order,
                prev: INVALID_INDEX,
                next: INVALID_INDEX,
            })
            .ok_or(PerpliqError::Overflow)?;
        self.index.insert(order_id, idx);
        self.header.order_count += 1;
        self.link_order(idx)?;

        debug!("book: placed order {}", order_id);
        Ok(order_id)
    }

    /// Cancel a resting order, returning it
    pub fn cancel_order(&mut self, order_id: u64) -> Result<Order> {
        let idx = *self
            .index
            .get(&order_id)
            .ok_or(PerpliqError::OrderNotFound(order_id))?;
        let order = self.unlink_order(idx)?;
        debug!("book: cancelled order {}", order_id);
        Ok(order)
    }

    /// Reduce a resting order by `filled_quantums`, removing it once fully filled.
    ///
    /// Returns the quantums still resting.
    pub fn remove_or_cancel(&mut self, order_id: u64, filled_quantums: u64) -> Result<u64> {
        let idx = *self
            .index
            .get(&order_id)
            .ok_or(PerpliqError::OrderNotFound(order_id))?;
        let entry = self
            .orders
            .get_mut(idx)
            .ok_or(PerpliqError::OrderNotFound(order_id))?;

        if filled_quantums > entry.order.quantums {
            return Err(PerpliqError::InvalidOrder(format!(
                "fill of {} exceeds {} resting on order {}",
                filled_quantums, entry.order.quantums, order_id
            )));
        }
        entry.order.quantums -= filled_quantums;
        let remaining = entry.order.quantums;

        if remaining == 0 {
            self.unlink_order(idx)?;
        } else {
            self.header.increment_seqno();
        }
        Ok(remaining)
    }

    /// Resting order ids on one side, best price first then time priority
    pub fn best_orders(&self, clob_pair_id: u32, side: Side) -> Result<Vec<u64>> {
        Ok(self.orders_on_side(clob_pair_id, side)?.map(|o| o.order_id).collect())
    }

    /// Resting orders on one side in priority order
    pub fn orders_on_side(
        &self,
        clob_pair_id: u32,
        side: Side,
    ) -> Result<impl Iterator<Item = &Order> + '_> {
        let head = self
            .heads
            .get(&clob_pair_id)
            .ok_or(PerpliqError::ClobPairNotFound(clob_pair_id))?
            .head(side);

        let mut curr_idx = head;
        Ok(std::iter::from_fn(move || {
            if curr_idx == INVALID_INDEX {
                return None;
            }
            let entry = self.orders.get(curr_idx)?;
            curr_idx = entry.next;
            Some(&entry.order)
        }))
    }

    /// Best bid and best ask in subticks
    pub fn best_prices(&self, clob_pair_id: u32) -> Result<(Option<u64>, Option<u64>)> {
        let best_bid = self.orders_on_side(clob_pair_id, Side::Buy)?.next().map(|o| o.subticks);
        let best_ask = self.orders_on_side(clob_pair_id, Side::Sell)?.next().map(|o| o.subticks);
        Ok((best_bid, best_ask))
    }

    /// Remove every resting order whose `good_til_block` has passed
    pub fn expire_orders(&mut self, block_height: u32) -> Result<Vec<u64>> {
        let expired: Vec<u64> = self
            .index
            .keys()
            .copied()
            .filter(|id| {
                self.get_order(*id)
                    .map(|o| o.is_expired(block_height))
                    .unwrap_or(false)
            })
            .collect();
        for id in &expired {
            self.cancel_order(*id)?;
        }
        if !expired.is_empty() {
            debug!("book: expired {} orders at height {}", expired.len(), block_height);
        }
        Ok(expired)
    }
}
