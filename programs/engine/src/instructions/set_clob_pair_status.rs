//! Set clob pair status - governance-gated trading status change

use log::{error, info};
use perpliq_common::*;

use crate::state::ExchangeState;

/// Whether a clob pair may move from `from` to `to`
pub fn is_valid_status_transition(from: ClobPairStatus, to: ClobPairStatus) -> bool {
    use ClobPairStatus::*;
    match (from, to) {
        (_, Unspecified) | (_, Initializing) => false,
        (Initializing, Active) => true,
        (Initializing, _) => false,
        _ => true,
    }
}

/// Change the trading status of a clob pair
///
/// # Arguments
/// * `state` - Exchange state
/// * `authority` - Signer of the request; must be the governance authority
/// * `clob_pair_id` - Clob pair to update
/// * `status` - New status
pub fn process_set_clob_pair_status(
    state: &mut ExchangeState,
    authority: &str,
    clob_pair_id: u32,
    status: ClobPairStatus,
) -> Result<()> {
    if authority != state.authority {
        return Err(PerpliqError::InvalidAuthority {
            expected: state.authority.clone(),
            got: authority.to_string(),
        });
    }

    let pair = state.book.clob_pair_mut(clob_pair_id).ok_or_else(|| {
        error!("Error: ClobPair with id {} not found", clob_pair_id);
        PerpliqError::ClobPairNotFound(clob_pair_id)
    })?;

    if pair.status != status && !is_valid_status_transition(pair.status, status) {
        return Err(PerpliqError::InvalidStatusTransition {
            from: pair.status.to_string(),
            to: status.to_string(),
        });
    }

    let previous = pair.status;
    pair.status = status;
    info!(
        "clob pair {} status changed from {} to {}",
        clob_pair_id, previous, status
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ClobPairStatus::*;

    #[test]
    fn test_status_transitions() {
        assert!(is_valid_status_transition(Initializing, Active));
        assert!(!is_valid_status_transition(Initializing, Paused));
        assert!(!is_valid_status_transition(Active, Initializing));
        assert!(is_valid_status_transition(Active, CancelOnly));
        assert!(is_valid_status_transition(Paused, Active));
        assert!(!is_valid_status_transition(Active, Unspecified));
    }
}
