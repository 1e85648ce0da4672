pub mod liquidate;
pub mod set_clob_pair_status;

pub use liquidate::*;
pub use set_clob_pair_status::*;
