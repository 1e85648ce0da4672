//! Price-time priority order book and liquidation matching

pub mod state;
pub mod matching;


pub use state::*;
pub use matching::*;
