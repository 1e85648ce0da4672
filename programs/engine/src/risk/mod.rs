pub mod margin;
pub mod fillable;
pub mod bankruptcy;

pub use margin::*;
pub use fillable::*;
pub use bankruptcy::*;
