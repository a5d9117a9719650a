//! Built-in behaviors shipped with the service.

pub mod control;
pub mod echo;
pub mod janitor;

pub use control::ControlBehavior;
pub use echo::EchoBehavior;
pub use janitor::JanitorBehavior;

use std::sync::Arc;
use valet_behavior::HotReloadLoader;

/// Origin string stamped on responses produced by the service itself.
pub const SERVICE_ORIGIN: &str = "valet";

/// Install the stock builder-table entries, so `--load` can construct the
/// bundled units by manifest.
pub fn install_builtin_builders(loader: &HotReloadLoader) {
    loader.add_builder("echo", Arc::new(echo::build));
}
