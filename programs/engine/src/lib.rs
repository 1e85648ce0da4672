//! Liquidation and deleveraging engine for perpetual futures
//!
//! Detects undercollateralized subaccounts, closes their positions against the
//! order book within the fillable price bound, and transfers what the book
//! cannot absorb to offsetting subaccounts at the bankruptcy price.

pub mod state;
pub mod oracle;
pub mod risk;
pub mod liquidation;
pub mod instructions;
pub mod genesis;


pub use state::*;
pub use oracle::*;
pub use risk::*;
pub use liquidation::*;
pub use instructions::*;
pub use genesis::*;
