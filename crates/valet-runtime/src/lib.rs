//! # valet-runtime
//!
//! The service core: the lifecycle state machine that drives the four
//! dispatch phases, the periodic schedules, and the built-in behaviors.
//!
//! ## Architecture
//!
//! ```text
//!   ┌────────────────┐   fetch/post/delete    ┌──────────────┐
//!   │  remote store   │◄──────────────────────┤  HttpStore    │
//!   └────────────────┘                        └──────┬───────┘
//!                                                    │
//!                       ┌────────────────────────────┴───────┐
//!                       │        ServiceLifecycle            │
//!                       │                                    │
//!    tick (100ms) ──────►  dispatch Tickable units           │
//!    net  (2s)    ──────►  sync → dispatch NetworkTickable   │
//!                       │        → post one blade cmd/device │
//!    status (90s) ──────►  log state + counts                │
//!                       └────────────┬───────────────────────┘
//!                                    │ BehaviorContext
//!                   ┌────────────────┼────────────────┐
//!                   ▼                ▼                ▼
//!             ┌──────────┐    ┌───────────┐    ┌───────────┐
//!             │ Registry  │    │ Synchron- │    │ BladeHub  │
//!             │ +Loader   │    │ izer      │    │           │
//!             └──────────┘    └───────────┘    └───────────┘
//! ```

pub mod behaviors;
pub mod lifecycle;

pub use behaviors::{
    ControlBehavior, EchoBehavior, JanitorBehavior, SERVICE_ORIGIN, install_builtin_builders,
};
pub use lifecycle::{ServiceLifecycle, ServiceState};
