use async_trait::async_trait;

use valet_core::{BladeMessage, LinkRequest, LinkResponse, ResponseDraft, Result};

/// Client seam to the remote store.
///
/// The runtime only ever talks to the store through this trait; the wiring
/// picks [`crate::HttpStore`] in production and [`crate::MockStore`] in
/// tests. Calls are the only suspension points in the whole service.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_requests(&self) -> Result<Vec<LinkRequest>>;
    async fn fetch_responses(&self) -> Result<Vec<LinkResponse>>;
    async fn fetch_blade_commands(&self) -> Result<Vec<BladeMessage>>;
    async fn fetch_blade_responses(&self) -> Result<Vec<BladeMessage>>;

    /// Post a response. The store assigns the record id.
    async fn post_response(&self, draft: &ResponseDraft) -> Result<()>;

    /// Post a blade command. The store keeps one record per origin,
    /// overwritten rather than appended.
    async fn post_blade_command(&self, msg: &BladeMessage) -> Result<()>;

    async fn delete_request(&self, id: i64) -> Result<()>;
    async fn delete_response(&self, id: i64) -> Result<()>;
    async fn delete_blade_command(&self, origin: &str) -> Result<()>;
    async fn delete_blade_response(&self, origin: &str) -> Result<()>;
}
