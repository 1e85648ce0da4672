pub mod header;
pub mod pools;
pub mod book;

pub use header::*;
pub use pools::*;
pub use book::*;
