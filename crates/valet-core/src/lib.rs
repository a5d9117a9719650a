//! # valet-core
//!
//! Core types, errors, and the control-command grammar for the Valet service
//! runtime. This crate defines the shared vocabulary used by every other
//! crate in the workspace.

pub mod command;
pub mod error;
pub mod types;

pub use command::{CommandParseError, ControlCommand, MANIFEST_EXT};
pub use error::{Result, ValetError};
pub use types::{BladeMessage, LinkRequest, LinkResponse, Phase, ResponseDraft};
