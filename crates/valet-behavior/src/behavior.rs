use async_trait::async_trait;

use crate::context::BehaviorContext;
use valet_core::{Phase, Result};

/// Which of the four dispatch phases a unit takes part in.
///
/// Declared explicitly by the unit; the registry inserts the unit into one
/// list per declared capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub init: bool,
    pub tick: bool,
    pub net_tick: bool,
    pub teardown: bool,
}

impl CapabilitySet {
    pub const fn none() -> Self {
        Self {
            init: false,
            tick: false,
            net_tick: false,
            teardown: false,
        }
    }

    pub const fn init(mut self) -> Self {
        self.init = true;
        self
    }

    pub const fn tick(mut self) -> Self {
        self.tick = true;
        self
    }

    pub const fn net_tick(mut self) -> Self {
        self.net_tick = true;
        self
    }

    pub const fn teardown(mut self) -> Self {
        self.teardown = true;
        self
    }

    pub fn contains(&self, phase: Phase) -> bool {
        match phase {
            Phase::Init => self.init,
            Phase::Tick => self.tick,
            Phase::NetTick => self.net_tick,
            Phase::Teardown => self.teardown,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.init || self.tick || self.net_tick || self.teardown)
    }

    /// Capability names, for logging.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.init {
            names.push("init");
        }
        if self.tick {
            names.push("tick");
        }
        if self.net_tick {
            names.push("net-tick");
        }
        if self.teardown {
            names.push("teardown");
        }
        names
    }
}

/// A pluggable unit of the service.
///
/// Phase methods return a tagged result instead of unwinding: an `Err` is a
/// unit fault, logged by the dispatch loop with phase context, and aborts
/// the remaining units of that phase for that cycle only.
///
/// Phase methods take `&self`; a unit that needs mutable state keeps it
/// behind its own lock. Dispatch within a phase is strictly sequential, so
/// such locks are never contended across units.
#[async_trait]
pub trait Behavior: Send + Sync {
    /// Unique name, used for hot-unload and fault logging.
    fn name(&self) -> &str;

    /// Dispatch order within each phase list; lower runs first. Units with
    /// equal priority keep their registration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Disabled units stay registered but are skipped by dispatch.
    fn enabled(&self) -> bool {
        true
    }

    fn capabilities(&self) -> CapabilitySet;

    async fn on_init(&self, _cx: &BehaviorContext) -> Result<()> {
        Ok(())
    }

    async fn on_tick(&self, _cx: &BehaviorContext) -> Result<()> {
        Ok(())
    }

    async fn on_net_tick(&self, _cx: &BehaviorContext) -> Result<()> {
        Ok(())
    }

    async fn on_teardown(&self, _cx: &BehaviorContext) -> Result<()> {
        Ok(())
    }
}
