pub mod cache;
pub mod error;

pub use cache::{ModelCache, ModelOptions};
pub use error::{ClassifierError, ConfigError};
