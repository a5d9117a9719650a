use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::loader::HotReloadLoader;
use crate::registry::BehaviorRegistry;
use valet_link::{BladeCommandHub, RemoteStateSynchronizer, RemoteStore};

/// The handle a unit receives on every dispatch.
///
/// Units act on shared state only through this context; they never hold
/// references to the registry lists, the unfilled-request set, or the blade
/// queues themselves. The lifecycle owns the context for the lifetime of the
/// running service.
#[derive(Clone)]
pub struct BehaviorContext {
    store: Arc<dyn RemoteStore>,
    sync: Arc<RemoteStateSynchronizer>,
    registry: Arc<BehaviorRegistry>,
    loader: Arc<HotReloadLoader>,
    shutdown: CancellationToken,
}

impl BehaviorContext {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        sync: Arc<RemoteStateSynchronizer>,
        registry: Arc<BehaviorRegistry>,
        loader: Arc<HotReloadLoader>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            sync,
            registry,
            loader,
            shutdown,
        }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn sync(&self) -> &RemoteStateSynchronizer {
        &self.sync
    }

    pub fn blades(&self) -> &BladeCommandHub {
        self.sync.hub()
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &HotReloadLoader {
        &self.loader
    }

    /// Ask the lifecycle to stop the whole service.
    pub fn request_stop(&self) {
        self.shutdown.cancel();
    }

    pub fn stop_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token the lifecycle watches for a stop request.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    // ── Conveniences mirroring the narrow unit-facing API ──────

    /// Answer an unfilled request, logging when the send is refused or the
    /// post fails.
    pub async fn send_response(&self, data: &str, origin: &str, request_id: i64) -> bool {
        let sent = self.sync.try_send_response(data, origin, request_id).await;
        if !sent {
            warn!(request_id, origin, "failed to send response");
        }
        sent
    }

    /// Queue a command for a tracked blade, logging when the blade is
    /// unknown.
    pub fn queue_blade_command(&self, blade: &str, data: &str) -> bool {
        let queued = self.blades().enqueue(blade, data);
        if !queued {
            warn!(blade, "failed to queue blade command");
        }
        queued
    }

    /// Delete a blade's command and/or response record from the remote
    /// store.
    pub async fn consume_blade_messages(
        &self,
        blade: &str,
        remove_command: bool,
        remove_response: bool,
    ) -> bool {
        self.blades()
            .consume(self.store.as_ref(), blade, remove_command, remove_response)
            .await
    }

    /// Wipe the remote store, logging when any deletion failed.
    pub async fn wipe_store(&self) -> bool {
        let wiped = self.sync.wipe().await;
        if !wiped {
            warn!("failed to delete all items from the remote store");
        }
        wiped
    }
}
