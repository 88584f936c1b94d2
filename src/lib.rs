pub mod columns;
pub mod config;
pub mod error;
pub mod fallback;
pub mod loader;
pub mod metrics;
pub mod output;
pub mod parser;
pub mod reference;
pub mod summary;
pub mod table;
pub mod transform;
pub mod validator;

pub use error::{Result, TrafficError};
