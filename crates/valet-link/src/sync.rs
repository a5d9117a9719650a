use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::hub::BladeCommandHub;
use crate::store::RemoteStore;
use valet_core::{LinkRequest, LinkResponse, ResponseDraft, Result};

/// What one successful sync cycle changed.
#[derive(Debug, Clone)]
pub struct SyncDiff {
    /// Requests with no response referencing them, in fetch order.
    pub unfilled: Vec<LinkRequest>,
    /// How many fetched requests were already answered.
    pub answered: usize,
    /// Blade origins first seen this cycle (now auto-tracked).
    pub discovered_blades: Vec<String>,
}

#[derive(Default)]
struct SyncState {
    requests: Vec<LinkRequest>,
    responses: Vec<LinkResponse>,
    unfilled: Vec<LinkRequest>,
}

/// Polls the remote store and keeps the set of unanswered requests.
///
/// A sync is atomic: all four collections are fetched before any local state
/// changes, so a failed fetch leaves the previous cycle's unfilled set and
/// blade state fully in effect.
pub struct RemoteStateSynchronizer {
    store: Arc<dyn RemoteStore>,
    hub: Arc<BladeCommandHub>,
    state: Mutex<SyncState>,
}

impl RemoteStateSynchronizer {
    pub fn new(store: Arc<dyn RemoteStore>, hub: Arc<BladeCommandHub>) -> Self {
        Self {
            store,
            hub,
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn hub(&self) -> &Arc<BladeCommandHub> {
        &self.hub
    }

    /// Fetch everything, recompute the unfilled-request set, and fold new
    /// blade traffic into the hub.
    pub async fn sync(&self) -> Result<SyncDiff> {
        // Fetch phase: nothing is applied until every fetch has succeeded.
        let requests = self.store.fetch_requests().await?;
        let responses = self.store.fetch_responses().await?;
        let blade_commands = self.store.fetch_blade_commands().await?;
        let blade_responses = self.store.fetch_blade_responses().await?;

        let answered_ids: HashSet<i64> = responses.iter().map(|r| r.request_id).collect();
        let unfilled: Vec<LinkRequest> = requests
            .iter()
            .filter(|r| !answered_ids.contains(&r.id))
            .cloned()
            .collect();
        let answered = requests.len() - unfilled.len();

        // Auto-discovery: any origin on either blade endpoint gets tracked
        // before its message is cached.
        let mut discovered = Vec::new();
        for msg in &blade_commands {
            if self.hub.track(&msg.origin) {
                discovered.push(msg.origin.clone());
            }
            self.hub.cache_command(&msg.origin, &msg.data);
        }
        for msg in &blade_responses {
            if self.hub.track(&msg.origin) {
                discovered.push(msg.origin.clone());
            }
            self.hub.cache_response(&msg.origin, &msg.data);
        }

        {
            let mut state = self.state.lock().await;
            state.requests = requests;
            state.responses = responses;
            state.unfilled = unfilled.clone();
        }

        debug!(
            unfilled = unfilled.len(),
            answered,
            discovered = discovered.len(),
            "sync complete"
        );
        Ok(SyncDiff {
            unfilled,
            answered,
            discovered_blades: discovered,
        })
    }

    /// Point-in-time snapshot of the unfilled requests.
    pub async fn unfilled_requests(&self) -> Vec<LinkRequest> {
        self.state.lock().await.unfilled.clone()
    }

    /// (requests, responses, unfilled) counts from the last successful sync.
    pub async fn counts(&self) -> (usize, usize, usize) {
        let state = self.state.lock().await;
        (state.requests.len(), state.responses.len(), state.unfilled.len())
    }

    /// Answer an unfilled request. Refused outright when the id is not
    /// currently unfilled; the id is forgotten locally only after the store
    /// accepts the post.
    pub async fn try_send_response(&self, data: &str, origin: &str, request_id: i64) -> bool {
        let known = {
            let state = self.state.lock().await;
            state.unfilled.iter().any(|r| r.id == request_id)
        };
        if !known {
            return false;
        }

        let draft = ResponseDraft::new(data, origin, request_id);
        match self.store.post_response(&draft).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.unfilled.retain(|r| r.id != request_id);
                true
            }
            Err(e) => {
                warn!(request_id, origin, error = %e, "failed to send response");
                false
            }
        }
    }

    /// Locally mark a request as handled without posting anything, so units
    /// later in the cycle never see it. False when not currently unfilled.
    pub async fn consume_request(&self, request_id: i64) -> bool {
        let mut state = self.state.lock().await;
        let before = state.unfilled.len();
        state.unfilled.retain(|r| r.id != request_id);
        state.unfilled.len() != before
    }

    /// Delete every known request and response record from the store.
    /// Partial failures are logged and not retried; returns true only if
    /// every deletion succeeded.
    pub async fn wipe(&self) -> bool {
        let (request_ids, response_ids) = {
            let state = self.state.lock().await;
            (
                state.requests.iter().map(|r| r.id).collect::<Vec<_>>(),
                state.responses.iter().map(|r| r.id).collect::<Vec<_>>(),
            )
        };

        let mut ok = true;
        for id in request_ids {
            if let Err(e) = self.store.delete_request(id).await {
                warn!(id, error = %e, "failed to delete request");
                ok = false;
            }
        }
        for id in response_ids {
            if let Err(e) = self.store.delete_response(id).await {
                warn!(id, error = %e, "failed to delete response");
                ok = false;
            }
        }
        info!(all_deleted = ok, "wiped remote store");
        ok
    }
}
