//! Shared domain types, errors, and configuration for callplan.

pub mod config;
pub mod error;
pub mod types;

pub use config::CallplanConfig;
pub use error::{CallplanError, Result};
pub use types::*;
