//! perpliq - liquidation and deleveraging engine for perpetual futures
//!
//! This is the root package providing test infrastructure and re-exports.
//! The engine itself lives in the workspace crates under `programs/`.

pub use perpliq_clob as clob;
pub use perpliq_common as common;
pub use perpliq_engine as engine;
