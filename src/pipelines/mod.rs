// Pipeline modules organized by functionality
pub mod emotion;
pub mod utils;

pub use emotion::*;
