//! Mock remote store for deterministic testing.
//!
//! Holds the four collections in memory, assigns response ids the way the
//! real store does, records every post and delete for assertions, and can
//! inject failures per endpoint. No HTTP involved.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::store::RemoteStore;
use valet_core::{BladeMessage, LinkRequest, LinkResponse, ResponseDraft, Result, ValetError};

#[derive(Default)]
struct Inner {
    requests: Vec<LinkRequest>,
    responses: Vec<LinkResponse>,
    blade_commands: Vec<BladeMessage>,
    blade_responses: Vec<BladeMessage>,
    next_response_id: i64,

    fail_fetch_requests: bool,
    fail_fetch_responses: bool,
    fail_fetch_blades: bool,
    fail_post_response: bool,
    fail_post_blade_command: bool,
    fail_deletes: bool,

    posted_responses: Vec<ResponseDraft>,
    posted_blade_commands: Vec<BladeMessage>,
    deleted_requests: Vec<i64>,
    deleted_responses: Vec<i64>,
}

/// An in-memory [`RemoteStore`] with failure injection.
///
/// # Example
/// ```
/// use valet_link::MockStore;
/// let store = MockStore::new()
///     .with_request(1, "--wipe")
///     .with_blade_response("kitchen", "done");
/// ```
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<Inner>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding ────────────────────────────────────────────────

    pub fn with_request(self, id: i64, text: &str) -> Self {
        self.push_request(id, text);
        self
    }

    pub fn with_response(self, id: i64, request_id: i64, origin: &str, data: &str) -> Self {
        {
            let mut inner = self.inner.lock();
            inner.responses.push(LinkResponse {
                id,
                request_id,
                origin: origin.into(),
                data: data.into(),
            });
            inner.next_response_id = inner.next_response_id.max(id + 1);
        }
        self
    }

    pub fn with_blade_command(self, origin: &str, data: &str) -> Self {
        self.inner
            .lock()
            .blade_commands
            .push(BladeMessage::new(origin, data));
        self
    }

    pub fn with_blade_response(self, origin: &str, data: &str) -> Self {
        self.inner
            .lock()
            .blade_responses
            .push(BladeMessage::new(origin, data));
        self
    }

    /// Add a request after construction (for multi-cycle tests).
    pub fn push_request(&self, id: i64, text: &str) {
        self.inner.lock().requests.push(LinkRequest {
            id,
            text: text.into(),
        });
    }

    // ── Failure injection ──────────────────────────────────────

    pub fn fail_fetch_requests(&self, fail: bool) {
        self.inner.lock().fail_fetch_requests = fail;
    }

    pub fn fail_fetch_responses(&self, fail: bool) {
        self.inner.lock().fail_fetch_responses = fail;
    }

    pub fn fail_fetch_blades(&self, fail: bool) {
        self.inner.lock().fail_fetch_blades = fail;
    }

    pub fn fail_post_response(&self, fail: bool) {
        self.inner.lock().fail_post_response = fail;
    }

    pub fn fail_post_blade_command(&self, fail: bool) {
        self.inner.lock().fail_post_blade_command = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.inner.lock().fail_deletes = fail;
    }

    // ── Assertions ─────────────────────────────────────────────

    pub fn posted_responses(&self) -> Vec<ResponseDraft> {
        self.inner.lock().posted_responses.clone()
    }

    pub fn posted_blade_commands(&self) -> Vec<BladeMessage> {
        self.inner.lock().posted_blade_commands.clone()
    }

    pub fn deleted_requests(&self) -> Vec<i64> {
        self.inner.lock().deleted_requests.clone()
    }

    pub fn deleted_responses(&self) -> Vec<i64> {
        self.inner.lock().deleted_responses.clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner.lock().requests.len()
    }

    pub fn response_count(&self) -> usize {
        self.inner.lock().responses.len()
    }

    fn refused(resource: &str) -> ValetError {
        ValetError::LinkStatus {
            resource: resource.into(),
            status: 500,
        }
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn fetch_requests(&self) -> Result<Vec<LinkRequest>> {
        let inner = self.inner.lock();
        if inner.fail_fetch_requests {
            return Err(Self::refused("requests"));
        }
        Ok(inner.requests.clone())
    }

    async fn fetch_responses(&self) -> Result<Vec<LinkResponse>> {
        let inner = self.inner.lock();
        if inner.fail_fetch_responses {
            return Err(Self::refused("responses"));
        }
        Ok(inner.responses.clone())
    }

    async fn fetch_blade_commands(&self) -> Result<Vec<BladeMessage>> {
        let inner = self.inner.lock();
        if inner.fail_fetch_blades {
            return Err(Self::refused("blade-commands"));
        }
        Ok(inner.blade_commands.clone())
    }

    async fn fetch_blade_responses(&self) -> Result<Vec<BladeMessage>> {
        let inner = self.inner.lock();
        if inner.fail_fetch_blades {
            return Err(Self::refused("blade-responses"));
        }
        Ok(inner.blade_responses.clone())
    }

    async fn post_response(&self, draft: &ResponseDraft) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_post_response {
            return Err(Self::refused("responses"));
        }
        let id = inner.next_response_id;
        inner.next_response_id += 1;
        inner.responses.push(LinkResponse {
            id,
            request_id: draft.request_id,
            origin: draft.origin.clone(),
            data: draft.data.clone(),
        });
        inner.posted_responses.push(draft.clone());
        Ok(())
    }

    async fn post_blade_command(&self, msg: &BladeMessage) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_post_blade_command {
            return Err(Self::refused("blade-commands"));
        }
        // One record per origin, overwritten rather than appended.
        inner.blade_commands.retain(|m| m.origin != msg.origin);
        inner.blade_commands.push(msg.clone());
        inner.posted_blade_commands.push(msg.clone());
        Ok(())
    }

    async fn delete_request(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_deletes {
            return Err(Self::refused("requests"));
        }
        inner.requests.retain(|r| r.id != id);
        inner.deleted_requests.push(id);
        Ok(())
    }

    async fn delete_response(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_deletes {
            return Err(Self::refused("responses"));
        }
        inner.responses.retain(|r| r.id != id);
        inner.deleted_responses.push(id);
        Ok(())
    }

    async fn delete_blade_command(&self, origin: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_deletes {
            return Err(Self::refused("blade-commands"));
        }
        inner.blade_commands.retain(|m| m.origin != origin);
        Ok(())
    }

    async fn delete_blade_response(&self, origin: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_deletes {
            return Err(Self::refused("blade-responses"));
        }
        inner.blade_responses.retain(|m| m.origin != origin);
        Ok(())
    }
}
