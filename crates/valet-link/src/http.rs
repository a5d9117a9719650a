use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::store::RemoteStore;
use valet_core::{BladeMessage, LinkRequest, LinkResponse, ResponseDraft, Result, ValetError};

/// HTTP+JSON implementation of [`RemoteStore`].
pub struct HttpStore {
    client: reqwest::Client,
    base: Url,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| ValetError::Link {
            resource: "base".into(),
            reason: format!("invalid base url '{base_url}': {e}"),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ValetError::Link {
                resource: "client".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, base })
    }

    fn url(&self, resource: &str) -> String {
        let base = self.base.as_str().trim_end_matches('/');
        format!("{base}/{resource}")
    }

    async fn get_all<T: DeserializeOwned>(&self, resource: &str) -> Result<Vec<T>> {
        let resp = self
            .client
            .get(self.url(resource))
            .send()
            .await
            .map_err(|e| ValetError::Link {
                resource: resource.into(),
                reason: e.to_string(),
            })?;
        if !resp.status().is_success() {
            return Err(ValetError::LinkStatus {
                resource: resource.into(),
                status: resp.status().as_u16(),
            });
        }
        resp.json().await.map_err(|e| ValetError::Link {
            resource: resource.into(),
            reason: format!("bad response body: {e}"),
        })
    }

    async fn post<T: Serialize>(&self, resource: &str, body: &T) -> Result<()> {
        let resp = self
            .client
            .post(self.url(resource))
            .json(body)
            .send()
            .await
            .map_err(|e| ValetError::Link {
                resource: resource.into(),
                reason: e.to_string(),
            })?;
        if !resp.status().is_success() {
            return Err(ValetError::LinkStatus {
                resource: resource.into(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn delete(&self, resource: &str, key: &str) -> Result<()> {
        let url = format!("{}/{key}", self.url(resource));
        let resp = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| ValetError::Link {
                resource: resource.into(),
                reason: e.to_string(),
            })?;
        if !resp.status().is_success() {
            return Err(ValetError::LinkStatus {
                resource: resource.into(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn fetch_requests(&self) -> Result<Vec<LinkRequest>> {
        self.get_all("requests").await
    }

    async fn fetch_responses(&self) -> Result<Vec<LinkResponse>> {
        self.get_all("responses").await
    }

    async fn fetch_blade_commands(&self) -> Result<Vec<BladeMessage>> {
        self.get_all("blade-commands").await
    }

    async fn fetch_blade_responses(&self) -> Result<Vec<BladeMessage>> {
        self.get_all("blade-responses").await
    }

    async fn post_response(&self, draft: &ResponseDraft) -> Result<()> {
        self.post("responses", draft).await
    }

    async fn post_blade_command(&self, msg: &BladeMessage) -> Result<()> {
        self.post("blade-commands", msg).await
    }

    async fn delete_request(&self, id: i64) -> Result<()> {
        self.delete("requests", &id.to_string()).await
    }

    async fn delete_response(&self, id: i64) -> Result<()> {
        self.delete("responses", &id.to_string()).await
    }

    async fn delete_blade_command(&self, origin: &str) -> Result<()> {
        self.delete("blade-commands", origin).await
    }

    async fn delete_blade_response(&self, origin: &str) -> Result<()> {
        self.delete("blade-responses", origin).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slashes() {
        let store = HttpStore::new("http://127.0.0.1:8780/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.url("requests"), "http://127.0.0.1:8780/api/requests");
        let store = HttpStore::new("http://127.0.0.1:8780/api", Duration::from_secs(5)).unwrap();
        assert_eq!(store.url("blade-commands"), "http://127.0.0.1:8780/api/blade-commands");
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(HttpStore::new("not a url", Duration::from_secs(5)).is_err());
    }
}
