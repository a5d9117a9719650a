use serde::{Deserialize, Serialize};
use std::fmt;

/// An inbound request fetched from the remote store.
///
/// Immutable once fetched; the synchronizer owns the current cycle's set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRequest {
    pub id: i64,
    pub text: String,
}

/// A response record fetched from the remote store. A request is answered
/// iff some response references its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    pub id: i64,
    pub request_id: i64,
    pub origin: String,
    pub data: String,
}

/// The post form of a response. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDraft {
    pub origin: String,
    pub data: String,
    pub request_id: i64,
}

impl ResponseDraft {
    pub fn new(data: impl Into<String>, origin: impl Into<String>, request_id: i64) -> Self {
        Self {
            origin: origin.into(),
            data: data.into(),
            request_id,
        }
    }
}

/// Wire record for both blade commands and blade responses. Which one it is
/// depends on the endpoint it was fetched from, not on a type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BladeMessage {
    pub origin: String,
    pub data: String,
}

impl BladeMessage {
    pub fn new(origin: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            data: data.into(),
        }
    }
}

/// The four dispatch phases of the service lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Init,
    Tick,
    NetTick,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Init => "init",
            Phase::Tick => "tick",
            Phase::NetTick => "net-tick",
            Phase::Teardown => "teardown",
        };
        f.write_str(s)
    }
}
