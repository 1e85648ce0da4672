pub mod book;
pub mod liquidation;

pub use liquidation::*;
