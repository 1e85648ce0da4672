pub mod ledger;
pub mod insurance;
pub mod markets;
pub mod block;
pub mod exchange;

pub use ledger::*;
pub use insurance::*;
pub use markets::*;
pub use block::*;
pub use exchange::*;
