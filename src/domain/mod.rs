pub mod market;
pub mod order;
pub mod signal;

pub use market::*;
pub use order::*;
pub use signal::*;
