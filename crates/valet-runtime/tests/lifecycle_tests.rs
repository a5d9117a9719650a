//! End-to-end lifecycle tests on a mock remote store with paused time.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use valet_behavior::{
    Behavior, BehaviorContext, BehaviorRegistry, CapabilitySet, HotReloadLoader,
};
use valet_config::ValetConfig;
use valet_core::Phase;
use valet_link::{BladeCommandHub, MockStore, RemoteStateSynchronizer, RemoteStore};
use valet_runtime::{
    ControlBehavior, JanitorBehavior, ServiceLifecycle, ServiceState, install_builtin_builders,
};

const NET_MS: u64 = 50;

/// One full wiring of the service over a mock store, with fast schedules.
fn rig(store: &MockStore, join_token: Option<&str>) -> ServiceLifecycle {
    let mut config = ValetConfig::default();
    config.service.tick_interval_ms = 10;
    config.service.net_interval_ms = NET_MS;
    config.service.status_interval_secs = 0;
    config.blades.join_token = join_token.map(String::from);

    let registry = Arc::new(BehaviorRegistry::new());
    let loader = Arc::new(HotReloadLoader::new(Arc::clone(&registry)));
    install_builtin_builders(&loader);

    let store_handle: Arc<dyn RemoteStore> = Arc::new(store.clone());
    let sync = Arc::new(RemoteStateSynchronizer::new(
        Arc::clone(&store_handle),
        Arc::new(BladeCommandHub::new()),
    ));
    let cx = BehaviorContext::new(
        store_handle,
        sync,
        registry,
        loader,
        CancellationToken::new(),
    );
    cx.registry()
        .register(Arc::new(ControlBehavior::new(config.blades.join_token.clone())));
    cx.registry().register(Arc::new(JanitorBehavior));

    ServiceLifecycle::new(config, cx)
}

/// Start the service and settle halfway into the first network period, so
/// every later [`net_cycles`] call spans exactly its cycle count.
async fn start_service(lifecycle: &ServiceLifecycle) {
    assert!(lifecycle.start().await);
    tokio::time::sleep(Duration::from_millis(NET_MS / 2)).await;
}

/// Let exactly `n` network cycles elapse under paused time.
async fn net_cycles(n: u64) {
    tokio::time::sleep(Duration::from_millis(NET_MS * n)).await;
}

/// A counting unit with a fixed phase, priority, and optional fault.
struct Probe {
    name: &'static str,
    priority: i32,
    caps: CapabilitySet,
    runs: AtomicUsize,
    faulty: bool,
}

impl Probe {
    fn new(name: &'static str, priority: i32, caps: CapabilitySet) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            caps,
            runs: AtomicUsize::new(0),
            faulty: false,
        })
    }

    fn faulty(name: &'static str, priority: i32, caps: CapabilitySet) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            caps,
            runs: AtomicUsize::new(0),
            faulty: true,
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn mark(&self) -> valet_core::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.faulty {
            return Err(valet_core::ValetError::fault(
                Phase::Tick,
                self.name,
                "probe fault",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Behavior for Probe {
    fn name(&self) -> &str {
        self.name
    }
    fn priority(&self) -> i32 {
        self.priority
    }
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }
    async fn on_init(&self, _cx: &BehaviorContext) -> valet_core::Result<()> {
        self.mark()
    }
    async fn on_tick(&self, _cx: &BehaviorContext) -> valet_core::Result<()> {
        self.mark()
    }
    async fn on_net_tick(&self, _cx: &BehaviorContext) -> valet_core::Result<()> {
        self.mark()
    }
    async fn on_teardown(&self, _cx: &BehaviorContext) -> valet_core::Result<()> {
        self.mark()
    }
}

// ── State machine ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn transitions_follow_the_state_machine() {
    let store = MockStore::new();
    let lifecycle = rig(&store, None);
    assert_eq!(lifecycle.state(), ServiceState::Stopped);
    assert!(!lifecycle.pause());
    assert!(!lifecycle.stop().await);

    assert!(lifecycle.start().await);
    assert_eq!(lifecycle.state(), ServiceState::Running);
    assert!(!lifecycle.start().await);

    assert!(lifecycle.pause());
    assert_eq!(lifecycle.state(), ServiceState::Paused);
    assert!(!lifecycle.pause());
    assert!(lifecycle.resume());
    assert_eq!(lifecycle.state(), ServiceState::Running);

    assert!(lifecycle.stop().await);
    assert_eq!(lifecycle.state(), ServiceState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn init_fault_aborts_later_initializers_but_service_runs() {
    let store = MockStore::new();
    let lifecycle = rig(&store, None);
    let first = Probe::faulty("first", 0, CapabilitySet::none().init());
    let second = Probe::new("second", 1, CapabilitySet::none().init());
    lifecycle.context().registry().register(first.clone());
    lifecycle.context().registry().register(second.clone());

    assert!(lifecycle.start().await);
    assert_eq!(lifecycle.state(), ServiceState::Running);
    assert_eq!(first.runs(), 1);
    assert_eq!(second.runs(), 0);
    lifecycle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn teardown_runs_on_stop() {
    let store = MockStore::new();
    let lifecycle = rig(&store, None);
    let unit = Probe::new("closer", 0, CapabilitySet::none().teardown());
    lifecycle.context().registry().register(unit.clone());

    lifecycle.start().await;
    lifecycle.stop().await;
    assert_eq!(unit.runs(), 1);
    // A second stop is refused and dispatches nothing.
    assert!(!lifecycle.stop().await);
    assert_eq!(unit.runs(), 1);
}

// ── Dispatch isolation ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn tick_fault_aborts_only_the_rest_of_that_cycle() {
    let store = MockStore::new();
    let lifecycle = rig(&store, None);
    let faulty = Probe::faulty("faulty", 0, CapabilitySet::none().tick());
    let after = Probe::new("after", 1, CapabilitySet::none().tick());
    lifecycle.context().registry().register(faulty.clone());
    lifecycle.context().registry().register(after.clone());

    start_service(&lifecycle).await;
    tokio::time::sleep(Duration::from_millis(35)).await;
    lifecycle.stop().await;

    // The faulting unit keeps running cycle after cycle; the one after it
    // in the same phase never gets a turn.
    assert!(faulty.runs() >= 2);
    assert_eq!(after.runs(), 0);
}

#[tokio::test(start_paused = true)]
async fn mid_cycle_unload_takes_effect_next_cycle() {
    struct Saboteur;

    #[async_trait]
    impl Behavior for Saboteur {
        fn name(&self) -> &str {
            "saboteur"
        }
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::none().net_tick()
        }
        async fn on_net_tick(&self, cx: &BehaviorContext) -> valet_core::Result<()> {
            cx.loader().unload("victim");
            Ok(())
        }
    }

    let store = MockStore::new();
    let lifecycle = rig(&store, None);
    let victim = Probe::new("victim", 1, CapabilitySet::none().net_tick());
    lifecycle.context().registry().register(Arc::new(Saboteur));
    lifecycle.context().registry().register(victim.clone());

    start_service(&lifecycle).await;
    net_cycles(2).await;
    lifecycle.stop().await;

    // The cycle that unloaded it was already iterating a snapshot, so the
    // victim still ran once; it was gone from the next cycle on.
    assert_eq!(victim.runs(), 1);
}

#[tokio::test(start_paused = true)]
async fn pause_gates_both_schedules() {
    let store = MockStore::new();
    let lifecycle = rig(&store, None);
    let ticker = Probe::new("ticker", 0, CapabilitySet::none().tick());
    let netter = Probe::new("netter", 0, CapabilitySet::none().net_tick());
    lifecycle.context().registry().register(ticker.clone());
    lifecycle.context().registry().register(netter.clone());

    start_service(&lifecycle).await;
    net_cycles(1).await;
    lifecycle.pause();
    let (ticks, nets) = (ticker.runs(), netter.runs());
    assert!(ticks > 0);
    assert!(nets > 0);

    net_cycles(3).await;
    assert_eq!(ticker.runs(), ticks);
    assert_eq!(netter.runs(), nets);

    lifecycle.resume();
    net_cycles(1).await;
    assert!(ticker.runs() > ticks);
    assert!(netter.runs() > nets);
    lifecycle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_sync_skips_net_dispatch_and_keeps_state() {
    let store = MockStore::new().with_request(1, "hello");
    let lifecycle = rig(&store, None);
    let netter = Probe::new("netter", 0, CapabilitySet::none().net_tick());
    lifecycle.context().registry().register(netter.clone());

    start_service(&lifecycle).await;
    net_cycles(1).await;
    assert_eq!(netter.runs(), 1);

    store.fail_fetch_requests(true);
    net_cycles(2).await;
    assert_eq!(netter.runs(), 1);
    // The previous cycle's view is still in effect. (The janitor consumed
    // this cycle's leftovers locally, but the store was never touched.)
    assert_eq!(store.request_count(), 1);

    store.fail_fetch_requests(false);
    net_cycles(1).await;
    assert_eq!(netter.runs(), 2);
    lifecycle.stop().await;
}

// ── Control commands end-to-end ────────────────────────────────

#[tokio::test(start_paused = true)]
async fn wipe_command_empties_the_store() {
    let store = MockStore::new().with_request(1, "--wipe");
    let lifecycle = rig(&store, None);

    start_service(&lifecycle).await;
    net_cycles(1).await;
    assert_eq!(store.request_count(), 0);
    assert_eq!(store.response_count(), 0);
    assert!(store.posted_responses().is_empty());

    // The next sync observes an empty request/response set.
    net_cycles(1).await;
    let (requests, responses, unfilled) = lifecycle.context().sync().counts().await;
    assert_eq!((requests, responses, unfilled), (0, 0, 0));
    lifecycle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn kill_command_responds_wipes_and_requests_stop() {
    let store = MockStore::new().with_request(7, "--kill");
    let lifecycle = rig(&store, None);

    start_service(&lifecycle).await;
    net_cycles(1).await;

    assert!(lifecycle.context().stop_requested());
    let posted = store.posted_responses();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].request_id, 7);
    assert!(posted[0].data.starts_with("[kill]"));
    // The triggering request was wiped; the response outlives it.
    assert_eq!(store.request_count(), 0);
    lifecycle.stop().await;
    assert_eq!(lifecycle.state(), ServiceState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn malformed_commands_answer_with_error_text() {
    let store = MockStore::new()
        .with_request(1, "--dance")
        .with_request(2, "--load?missing-arg.toml");
    let lifecycle = rig(&store, None);

    start_service(&lifecycle).await;
    net_cycles(1).await;
    lifecycle.stop().await;

    let posted = store.posted_responses();
    assert_eq!(posted.len(), 2);
    assert!(posted[0].data.contains("unknown command verb"));
    assert_eq!(posted[0].request_id, 1);
    assert!(posted[1].data.contains("argument"));
    assert_eq!(posted[1].request_id, 2);
}

#[tokio::test(start_paused = true)]
async fn load_failure_leaves_registry_unchanged_and_reports_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("bad.toml");
    std::fs::write(&manifest, "[unit]\npriority = \"high\"\n").unwrap();

    let store = MockStore::new().with_request(3, &format!("--load?{}?broken", manifest.display()));
    let lifecycle = rig(&store, None);
    let before = lifecycle.context().registry().count(Phase::NetTick);

    start_service(&lifecycle).await;
    net_cycles(1).await;
    lifecycle.stop().await;

    let posted = store.posted_responses();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].request_id, 3);
    assert!(posted[0].data.contains("rejected"));
    assert!(posted[0].data.contains("builder"));
    assert_eq!(lifecycle.context().registry().count(Phase::NetTick), before);
    assert!(!lifecycle.context().registry().contains("broken"));
}

#[tokio::test(start_paused = true)]
async fn load_unload_round_trip_through_commands() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("greeter.toml");
    std::fs::write(
        &manifest,
        "[unit]\nbuilder = \"echo\"\n\n[params]\nprefix = \"you said: \"\n",
    )
    .unwrap();

    let store =
        MockStore::new().with_request(1, &format!("--load?{}?greeter", manifest.display()));
    let lifecycle = rig(&store, None);

    start_service(&lifecycle).await;
    net_cycles(1).await;
    assert!(lifecycle.context().registry().contains("greeter"));
    let posted = store.posted_responses();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].data.contains("loaded 'greeter'"));

    // The loaded unit answers ordinary requests from the next cycle on.
    store.push_request(2, "hello");
    net_cycles(1).await;
    let posted = store.posted_responses();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[1].request_id, 2);
    assert_eq!(posted[1].data, "you said: hello");

    store.push_request(3, "--unload?greeter");
    net_cycles(1).await;
    assert!(!lifecycle.context().registry().contains("greeter"));
    let posted = store.posted_responses();
    assert!(posted[2].data.contains("removed 'greeter'"));

    // Unloading again reports the absence instead of failing.
    store.push_request(4, "--unload?greeter");
    net_cycles(1).await;
    let posted = store.posted_responses();
    assert!(posted[3].data.contains("no unit named 'greeter'"));
    lifecycle.stop().await;
}

// ── Blades end-to-end ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn postblade_tracks_echoes_and_consumes() {
    let store = MockStore::new().with_blade_response("porch", "--postblade?deck?tok");
    let lifecycle = rig(&store, Some("tok"));

    start_service(&lifecycle).await;
    net_cycles(1).await;

    let hub = lifecycle.context().blades();
    assert!(hub.is_tracked("porch")); // auto-discovered
    assert!(hub.is_tracked("deck")); // tracked by postblade
    // The triggering device message was consumed from the store.
    assert!(store.fetch_blade_responses().await.unwrap().is_empty());

    // The success echo went out as the porch's one command this cycle.
    let cmds = store.posted_blade_commands();
    assert_eq!(cmds.len(), 1);
    assert_eq!(cmds[0].origin, "porch");
    assert!(cmds[0].data.contains("tracking 'deck'"));
    lifecycle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn postblade_with_bad_token_is_refused() {
    let store = MockStore::new().with_blade_response("porch", "--postblade?deck?wrong");
    let lifecycle = rig(&store, Some("tok"));

    start_service(&lifecycle).await;
    net_cycles(1).await;
    lifecycle.stop().await;

    assert!(!lifecycle.context().blades().is_tracked("deck"));
    let cmds = store.posted_blade_commands();
    assert_eq!(cmds.len(), 1);
    assert!(cmds[0].data.contains("refused"));
}

#[tokio::test(start_paused = true)]
async fn postblade_from_the_request_channel_is_an_error() {
    let store = MockStore::new().with_request(1, "--postblade?deck?tok");
    let lifecycle = rig(&store, Some("tok"));

    start_service(&lifecycle).await;
    net_cycles(1).await;
    lifecycle.stop().await;

    assert!(!lifecycle.context().blades().is_tracked("deck"));
    let posted = store.posted_responses();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].data.contains("device channel"));
}

#[tokio::test(start_paused = true)]
async fn one_queued_command_posts_per_device_per_cycle() {
    let store = MockStore::new().with_blade_response("d", "reading: 21c");
    let lifecycle = rig(&store, None);

    start_service(&lifecycle).await;
    net_cycles(1).await; // auto-discovers "d"

    let hub = lifecycle.context().blades();
    assert!(hub.enqueue("d", "x"));
    assert!(hub.enqueue("d", "y"));

    net_cycles(1).await;
    assert_eq!(store.posted_blade_commands().len(), 1);
    assert_eq!(store.posted_blade_commands()[0].data, "x");

    net_cycles(1).await;
    let cmds = store.posted_blade_commands();
    assert_eq!(cmds.len(), 2);
    assert_eq!(cmds[1].data, "y");
    lifecycle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_blade_post_retries_next_cycle() {
    let store = MockStore::new().with_blade_response("d", "reading: 21c");
    let lifecycle = rig(&store, None);

    start_service(&lifecycle).await;
    net_cycles(1).await;
    lifecycle.context().blades().enqueue("d", "x");

    store.fail_post_blade_command(true);
    net_cycles(1).await;
    assert!(store.posted_blade_commands().is_empty());

    store.fail_post_blade_command(false);
    net_cycles(1).await;
    assert_eq!(store.posted_blade_commands().len(), 1);
    assert_eq!(store.posted_blade_commands()[0].data, "x");
    lifecycle.stop().await;
}
