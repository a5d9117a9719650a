//! # valet-link
//!
//! Everything that talks to the remote request/response store: the
//! [`RemoteStore`] client seam (HTTP implementation plus an in-memory mock
//! for tests), the [`RemoteStateSynchronizer`] that polls the store and
//! computes which inbound requests remain unanswered, and the
//! [`BladeCommandHub`] that tracks remote devices and their per-device
//! command queues.
//!
//! The store holds four collections, each exposed as
//! get-all / post / delete-by-key:
//!
//! - requests         `{ id, text }`
//! - responses        `{ id, requestId, origin, data }`
//! - blade-commands   `{ origin, data }`  (one record per device)
//! - blade-responses  `{ origin, data }`  (one record per device)

pub mod http;
pub mod hub;
pub mod mock;
pub mod store;
pub mod sync;

pub use http::HttpStore;
pub use hub::BladeCommandHub;
pub use mock::MockStore;
pub use store::RemoteStore;
pub use sync::{RemoteStateSynchronizer, SyncDiff};
