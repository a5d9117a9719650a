use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use crate::behavior::Behavior;
use valet_core::Phase;

#[derive(Default)]
struct Lists {
    init: Vec<Arc<dyn Behavior>>,
    tick: Vec<Arc<dyn Behavior>>,
    net_tick: Vec<Arc<dyn Behavior>>,
    teardown: Vec<Arc<dyn Behavior>>,
}

impl Lists {
    fn list(&self, phase: Phase) -> &Vec<Arc<dyn Behavior>> {
        match phase {
            Phase::Init => &self.init,
            Phase::Tick => &self.tick,
            Phase::NetTick => &self.net_tick,
            Phase::Teardown => &self.teardown,
        }
    }

    fn list_mut(&mut self, phase: Phase) -> &mut Vec<Arc<dyn Behavior>> {
        match phase {
            Phase::Init => &mut self.init,
            Phase::Tick => &mut self.tick,
            Phase::NetTick => &mut self.net_tick,
            Phase::Teardown => &mut self.teardown,
        }
    }
}

const ALL_PHASES: [Phase; 4] = [Phase::Init, Phase::Tick, Phase::NetTick, Phase::Teardown];

/// Four priority-ordered lists of units, one per capability.
///
/// Registration inserts the unit into every list its capability set names
/// and re-sorts that list by priority ascending; the sort is stable, so
/// units with equal priority keep their registration order across restarts.
/// `snapshot` hands out an immutable copy, which is what lets a dispatched
/// unit register or unregister mid-cycle without disturbing the list
/// currently being iterated; the mutation shows up next cycle.
#[derive(Default)]
pub struct BehaviorRegistry {
    lists: RwLock<Lists>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a unit into every capability list it declares.
    pub fn register(&self, unit: Arc<dyn Behavior>) {
        let caps = unit.capabilities();
        let mut lists = self.lists.write();
        for phase in ALL_PHASES {
            if caps.contains(phase) {
                let list = lists.list_mut(phase);
                list.push(Arc::clone(&unit));
                list.sort_by_key(|u| u.priority());
            }
        }
        info!(
            behavior = unit.name(),
            priority = unit.priority(),
            capabilities = ?caps.names(),
            "registered behavior"
        );
    }

    /// Remove a unit by name from every list it appears in. Removing an
    /// absent name is a no-op returning false.
    pub fn unregister(&self, name: &str) -> bool {
        let mut removed = false;
        let mut lists = self.lists.write();
        for phase in ALL_PHASES {
            let list = lists.list_mut(phase);
            let before = list.len();
            list.retain(|u| u.name() != name);
            removed |= list.len() != before;
        }
        if removed {
            info!(behavior = name, "unregistered behavior");
        }
        removed
    }

    /// Whether any list holds a unit with this name.
    pub fn contains(&self, name: &str) -> bool {
        let lists = self.lists.read();
        ALL_PHASES
            .iter()
            .any(|&phase| lists.list(phase).iter().any(|u| u.name() == name))
    }

    /// Point-in-time copy of one capability list, in dispatch order.
    pub fn snapshot(&self, phase: Phase) -> Vec<Arc<dyn Behavior>> {
        self.lists.read().list(phase).clone()
    }

    /// Per-phase list length, for the status report.
    pub fn count(&self, phase: Phase) -> usize {
        self.lists.read().list(phase).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::CapabilitySet;
    use async_trait::async_trait;

    struct Plain {
        name: String,
        priority: i32,
        caps: CapabilitySet,
    }

    #[async_trait]
    impl Behavior for Plain {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn capabilities(&self) -> CapabilitySet {
            self.caps
        }
    }

    fn tick_unit(name: &str, priority: i32) -> Arc<dyn Behavior> {
        Arc::new(Plain {
            name: name.into(),
            priority,
            caps: CapabilitySet::none().tick(),
        })
    }

    #[test]
    fn snapshot_orders_by_priority_with_stable_ties() {
        let registry = BehaviorRegistry::new();
        registry.register(tick_unit("a", 5));
        registry.register(tick_unit("b", 1));
        registry.register(tick_unit("c", 5));
        registry.register(tick_unit("d", 3));

        let snapshot = registry.snapshot(Phase::Tick);
        let order: Vec<(i32, &str)> = snapshot.iter().map(|u| (u.priority(), u.name())).collect();
        assert_eq!(order, vec![(1, "b"), (3, "d"), (5, "a"), (5, "c")]);
    }

    #[test]
    fn register_inserts_into_every_declared_list() {
        let registry = BehaviorRegistry::new();
        registry.register(Arc::new(Plain {
            name: "multi".into(),
            priority: 0,
            caps: CapabilitySet::none().init().net_tick(),
        }));
        assert_eq!(registry.count(Phase::Init), 1);
        assert_eq!(registry.count(Phase::NetTick), 1);
        assert_eq!(registry.count(Phase::Tick), 0);
        assert!(registry.contains("multi"));
    }

    #[test]
    fn unregister_removes_everywhere_and_is_idempotent() {
        let registry = BehaviorRegistry::new();
        registry.register(Arc::new(Plain {
            name: "multi".into(),
            priority: 0,
            caps: CapabilitySet::none().tick().teardown(),
        }));
        assert!(registry.unregister("multi"));
        assert_eq!(registry.count(Phase::Tick), 0);
        assert_eq!(registry.count(Phase::Teardown), 0);
        assert!(!registry.unregister("multi"));
        assert!(!registry.unregister("never-registered"));
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutation() {
        let registry = BehaviorRegistry::new();
        registry.register(tick_unit("a", 0));
        let snapshot = registry.snapshot(Phase::Tick);
        registry.unregister("a");
        registry.register(tick_unit("b", 0));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name(), "a");
        let fresh = registry.snapshot(Phase::Tick);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].name(), "b");
    }
}
