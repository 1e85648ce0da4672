//! Shared types, fixed-point math and errors for the liquidation engine

pub mod types;
pub mod math;
pub mod error;
pub mod config;

#[cfg(test)]
mod tests;

pub use types::*;
pub use math::*;
pub use error::*;
pub use config::*;
