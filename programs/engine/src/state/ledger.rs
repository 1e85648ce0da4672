//! Subaccount ledger with atomic multi-account updates

use std::collections::BTreeMap;

use log::{debug, error};
use perpliq_common::*;
use serde::{Deserialize, Serialize};

/// Change to one perpetual position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpetualUpdate {
    pub perpetual_id: u32,
    /// Signed base quantums added to the position
    pub quantums_delta: i128,
    /// Prevailing global funding index for the perpetual
    pub funding_index: i128,
}

/// Change to one subaccount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubaccountUpdate {
    pub id: SubaccountId,
    /// Signed quote quantums added to the USDC balance
    pub quote_delta: i128,
    pub perpetual_updates: Vec<PerpetualUpdate>,
}

impl SubaccountUpdate {
    pub fn quote(id: SubaccountId, quote_delta: i128) -> Self {
        Self {
            id,
            quote_delta,
            perpetual_updates: Vec::new(),
        }
    }

    pub fn with_position(mut self, perpetual_id: u32, quantums_delta: i128, funding_index: i128) -> Self {
        self.perpetual_updates.push(PerpetualUpdate {
            perpetual_id,
            quantums_delta,
            funding_index,
        });
        self
    }
}

/// Subaccount storage used by the engine
pub trait SubaccountStore {
    fn get(&self, id: &SubaccountId) -> Option<&Subaccount>;

    /// Apply every update or none of them
    fn apply(&mut self, updates: &[SubaccountUpdate]) -> Result<()>;
}

/// In-memory subaccount ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubaccountLedger {
    accounts: BTreeMap<SubaccountId, Subaccount>,
}

impl SubaccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a subaccount, normalising zero entries away
    pub fn insert(&mut self, mut subaccount: Subaccount) {
        subaccount.asset_positions.retain(|_, q| *q != 0);
        subaccount.perpetual_positions.retain(|_, p| p.quantums != 0);
        self.accounts.insert(subaccount.id.clone(), subaccount);
    }

    pub fn contains(&self, id: &SubaccountId) -> bool {
        self.accounts.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Subaccounts in id order
    pub fn iter(&self) -> impl Iterator<Item = &Subaccount> {
        self.accounts.values()
    }

    /// Subaccounts holding a position of the given sign in a perpetual, in id order
    pub fn holders(&self, perpetual_id: u32, long: bool) -> impl Iterator<Item = &Subaccount> {
        self.accounts.values().filter(move |s| {
            let q = s.position_quantums(perpetual_id);
            if long {
                q > 0
            } else {
                q < 0
            }
        })
    }
}

/// Apply one update to a staged copy of a subaccount
fn apply_update(subaccount: &mut Subaccount, update: &SubaccountUpdate) -> Result<()> {
    let mut quote = subaccount.quote_balance();

    for pu in &update.perpetual_updates {
        let existing = subaccount
            .perpetual_positions
            .get(&pu.perpetual_id)
            .copied()
            .unwrap_or(PerpetualPosition {
                quantums: 0,
                funding_index: pu.funding_index,
            });

        // Funding settles before the size changes so the index can move with it.
        let settlement = funding_settlement(existing.quantums, existing.funding_index, pu.funding_index)?;
        quote = quote.checked_add(settlement).ok_or(PerpliqError::Overflow)?;

        let quantums = existing
            .quantums
            .checked_add(pu.quantums_delta)
            .ok_or(PerpliqError::Overflow)?;
        if quantums == 0 {
            subaccount.perpetual_positions.remove(&pu.perpetual_id);
        } else {
            subaccount.perpetual_positions.insert(
                pu.perpetual_id,
                PerpetualPosition {
                    quantums,
                    funding_index: pu.funding_index,
                },
            );
        }
    }

    quote = quote
        .checked_add(update.quote_delta)
        .ok_or(PerpliqError::Overflow)?;
    if quote == 0 {
        subaccount.asset_positions.remove(&QUOTE_ASSET_ID);
    } else {
        subaccount.asset_positions.insert(QUOTE_ASSET_ID, quote);
    }
    Ok(())
}

impl SubaccountStore for SubaccountLedger {
    fn get(&self, id: &SubaccountId) -> Option<&Subaccount> {
        self.accounts.get(id)
    }

    fn apply(&mut self, updates: &[SubaccountUpdate]) -> Result<()> {
        let mut staged: BTreeMap<SubaccountId, Subaccount> = BTreeMap::new();

        for update in updates {
            if !staged.contains_key(&update.id) {
                let current = self.accounts.get(&update.id).cloned().ok_or_else(|| {
                    error!("ledger: update for unknown subaccount {}", update.id);
                    PerpliqError::LedgerInvariant(format!("update for unknown subaccount {}", update.id))
                })?;
                staged.insert(update.id.clone(), current);
            }
            if let Some(sub) = staged.get_mut(&update.id) {
                apply_update(sub, update)?;
            }
        }

        for (id, sub) in staged {
            debug!("ledger: committed {}", id);
            self.accounts.insert(id, sub);
        }
        Ok(())
    }
}
