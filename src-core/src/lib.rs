pub mod constants;
pub mod errors;
pub mod expenses;
pub mod insights;
pub mod session;
pub mod tracker;

pub use errors::{Error, Result};
pub use expenses::*;
pub use tracker::*;
