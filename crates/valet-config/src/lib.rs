//! # valet-config
//!
//! Configuration system for the Valet runtime. Reads from `valet.toml` and
//! environment variables, in that precedence order.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{ConfigWarning, ValetConfig, WarningSeverity};
