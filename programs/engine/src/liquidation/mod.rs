pub mod orders;
pub mod settle;
pub mod deleveraging;

pub use orders::*;
pub use settle::*;
pub use deleveraging::*;
