//! # valet-behavior
//!
//! The pluggable-unit layer of the Valet runtime: the [`Behavior`] trait a
//! unit implements, the priority-ordered [`BehaviorRegistry`] the dispatch
//! loop iterates, the [`BehaviorContext`] handle a unit receives on every
//! dispatch, and the [`HotReloadLoader`] that registers and deregisters
//! manifest-described units while the service is running.
//!
//! Units declare their capability set explicitly; there is no runtime type
//! introspection. A unit never holds references into shared state; it acts
//! only through the narrow contracts on the context handle.

pub mod behavior;
pub mod context;
pub mod loader;
pub mod registry;

pub use behavior::{Behavior, CapabilitySet};
pub use context::BehaviorContext;
pub use loader::{Diagnostic, HotReloadLoader, LoadError, LoadReport, Severity, UnitBuilder, UnitManifest};
pub use registry::BehaviorRegistry;
