use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use valet_behavior::BehaviorContext;
use valet_config::ValetConfig;
use valet_core::Phase;

/// States of the service lifecycle. Transitions are driven externally
/// (host start/stop/pause commands) except the tick transitions inside
/// `Running`, which are internal to the schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    StartPending,
    Running,
    PausePending,
    Paused,
    ContinuePending,
    StopPending,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Stopped => "stopped",
            ServiceState::StartPending => "start-pending",
            ServiceState::Running => "running",
            ServiceState::PausePending => "pause-pending",
            ServiceState::Paused => "paused",
            ServiceState::ContinuePending => "continue-pending",
            ServiceState::StopPending => "stop-pending",
        };
        f.write_str(s)
    }
}

/// Drives the four dispatch phases over the behavior registry.
///
/// Two independent schedules run while the service is `Running`: a fast
/// tick and a slower network tick. The network tick is self-re-arming:
/// its timer only restarts after a full sync+dispatch cycle completes, so
/// a slow remote store can never overlap two cycles. A third schedule
/// periodically logs a status report.
///
/// Every phase applies the same failure-isolation policy: the whole
/// ordered iteration sits inside one fault boundary, so a faulting unit
/// aborts only the units after it in that phase, for that cycle. This is
/// deliberately phase-level isolation, not per-unit.
pub struct ServiceLifecycle {
    config: ValetConfig,
    cx: BehaviorContext,
    state: Arc<RwLock<ServiceState>>,
    schedules: Mutex<Option<CancellationToken>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceLifecycle {
    pub fn new(config: ValetConfig, cx: BehaviorContext) -> Self {
        Self {
            config,
            cx,
            state: Arc::new(RwLock::new(ServiceState::Stopped)),
            schedules: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    pub fn context(&self) -> &BehaviorContext {
        &self.cx
    }

    /// Start the service: dispatch the init phase, then spawn the
    /// schedules. False when not currently stopped.
    pub async fn start(&self) -> bool {
        {
            let mut state = self.state.write();
            if *state != ServiceState::Stopped {
                warn!(state = %*state, "ignoring start request");
                return false;
            }
            *state = ServiceState::StartPending;
        }

        Self::run_phase(&self.cx, Phase::Init).await;

        let token = CancellationToken::new();
        self.spawn_schedules(&token);
        *self.schedules.lock() = Some(token);
        *self.state.write() = ServiceState::Running;
        info!("service started");
        true
    }

    /// Suspend dispatch without tearing the schedules down.
    pub fn pause(&self) -> bool {
        let mut state = self.state.write();
        if *state != ServiceState::Running {
            warn!(state = %*state, "ignoring pause request");
            return false;
        }
        *state = ServiceState::PausePending;
        *state = ServiceState::Paused;
        info!("service paused");
        true
    }

    /// Resume dispatch after a pause.
    pub fn resume(&self) -> bool {
        let mut state = self.state.write();
        if *state != ServiceState::Paused {
            warn!(state = %*state, "ignoring continue request");
            return false;
        }
        *state = ServiceState::ContinuePending;
        *state = ServiceState::Running;
        info!("service resumed");
        true
    }

    /// Stop the service: cancel the schedules, let an in-flight network
    /// cycle finish naturally, then dispatch the teardown phase.
    pub async fn stop(&self) -> bool {
        {
            let mut state = self.state.write();
            if !matches!(*state, ServiceState::Running | ServiceState::Paused) {
                warn!(state = %*state, "ignoring stop request");
                return false;
            }
            *state = ServiceState::StopPending;
        }

        if let Some(token) = self.schedules.lock().take() {
            token.cancel();
        }
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            // An in-flight cycle finishes naturally rather than being
            // aborted mid-call, so remote state is never half-applied.
            let _ = task.await;
        }

        Self::run_phase(&self.cx, Phase::Teardown).await;
        *self.state.write() = ServiceState::Stopped;
        info!("service stopped");
        true
    }

    /// Start, then run until something trips the shutdown token (a `--kill`
    /// command or the host), then stop.
    pub async fn run_until_stopped(&self) -> bool {
        if !self.start().await {
            return false;
        }
        self.cx.shutdown_token().cancelled().await;
        self.stop().await
    }

    fn spawn_schedules(&self, token: &CancellationToken) {
        let mut tasks = self.tasks.lock();

        // Fast tick.
        {
            let cx = self.cx.clone();
            let state = Arc::clone(&self.state);
            let token = token.clone();
            let period = Duration::from_millis(self.config.service.tick_interval_ms);
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = interval.tick() => {
                            if *state.read() != ServiceState::Running {
                                continue;
                            }
                            Self::run_phase(&cx, Phase::Tick).await;
                        }
                    }
                }
            }));
        }

        // Network tick: sleep, then run one full cycle to completion
        // before sleeping again. Cancellation stops the re-arm, never an
        // in-flight cycle.
        {
            let cx = self.cx.clone();
            let state = Arc::clone(&self.state);
            let token = token.clone();
            let period = Duration::from_millis(self.config.service.net_interval_ms);
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(period) => {
                            if *state.read() != ServiceState::Running {
                                continue;
                            }
                            Self::run_net_cycle(&cx).await;
                        }
                    }
                }
            }));
        }

        // Status report.
        if self.config.service.status_interval_secs > 0 {
            let cx = self.cx.clone();
            let state = Arc::clone(&self.state);
            let token = token.clone();
            let period = Duration::from_secs(self.config.service.status_interval_secs);
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick of an interval fires immediately.
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = interval.tick() => {
                            let current = *state.read();
                            Self::report_status(&cx, current).await;
                        }
                    }
                }
            }));
        }
    }

    /// Dispatch every enabled unit of one phase, in priority order, inside
    /// a single fault boundary: the first fault logs and aborts the
    /// remainder of the phase for this cycle.
    async fn run_phase(cx: &BehaviorContext, phase: Phase) {
        let units = cx.registry().snapshot(phase);
        for unit in units {
            if !unit.enabled() {
                continue;
            }
            let outcome = match phase {
                Phase::Init => unit.on_init(cx).await,
                Phase::Tick => unit.on_tick(cx).await,
                Phase::NetTick => unit.on_net_tick(cx).await,
                Phase::Teardown => unit.on_teardown(cx).await,
            };
            if let Err(fault) = outcome {
                error!(
                    phase = %phase,
                    behavior = unit.name(),
                    error = %fault,
                    "behavior fault, aborting remainder of phase cycle"
                );
                break;
            }
        }
    }

    /// One network cycle: sync, and only on success dispatch the net-tick
    /// phase and post at most one queued blade command per device.
    async fn run_net_cycle(cx: &BehaviorContext) {
        match cx.sync().sync().await {
            Ok(diff) => {
                if !diff.discovered_blades.is_empty() {
                    info!(blades = ?diff.discovered_blades, "discovered new blades");
                }
                Self::run_phase(cx, Phase::NetTick).await;
                Self::post_blade_commands(cx).await;
            }
            Err(e) => {
                warn!(error = %e, "sync failed, keeping previous cycle state");
            }
        }
    }

    /// Post the head of each tracked device's queue, one command per
    /// device per cycle to bound the store's write volume. A failed post
    /// leaves the command queued for the next cycle.
    async fn post_blade_commands(cx: &BehaviorContext) {
        for name in cx.blades().tracked() {
            let Some(data) = cx.blades().peek_command(&name) else {
                continue;
            };
            let msg = valet_core::BladeMessage::new(name.clone(), data);
            match cx.store().post_blade_command(&msg).await {
                Ok(()) => {
                    cx.blades().pop_command(&name);
                    cx.blades().cache_command(&name, &msg.data);
                    debug!(blade = %name, "posted blade command");
                }
                Err(e) => {
                    warn!(blade = %name, error = %e, "failed to post blade command, will retry");
                }
            }
        }
    }

    async fn report_status(cx: &BehaviorContext, state: ServiceState) {
        let (requests, responses, unfilled) = cx.sync().counts().await;
        let registry = cx.registry();
        info!(
            state = %state,
            init = registry.count(Phase::Init),
            tick = registry.count(Phase::Tick),
            net_tick = registry.count(Phase::NetTick),
            teardown = registry.count(Phase::Teardown),
            requests,
            responses,
            unfilled,
            blades = cx.blades().tracked_count(),
            "status check"
        );
    }
}
