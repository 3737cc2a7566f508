//! Remote snapshot store client
//!
//! The remote store is an opaque HTTP key-value blob service: one record
//! per username holding that user's full snapshot, with the shared
//! identity list duplicated under the seeded admin's record. Availability
//! and latency are not under this crate's control; every caller treats
//! failures as non-fatal.

mod types;

use async_trait::async_trait;
use log::warn;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use url::Url;

use crate::error::Error;
use crate::model::{now_millis, SnapshotPatch, User};

pub use types::{PushPayload, RemoteSnapshot};

/// Port to the remote snapshot store. Production uses [`HttpRemoteStore`];
/// tests may substitute an in-memory fake.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload a user's snapshot, replacing the remote record
    async fn put_snapshot(&self, payload: &PushPayload) -> Result<(), Error>;

    /// Download a user's record by username
    async fn fetch_snapshot(&self, username: &str) -> Result<RemoteSnapshot, Error>;
}

/// HTTP implementation of the remote store port
pub struct HttpRemoteStore {
    api_url: Url,
    client: Client,
}

impl HttpRemoteStore {
    /// Create a client for the remote store endpoint
    pub fn new(api_url: Url, timeout: Option<std::time::Duration>) -> Result<Self, Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            api_url,
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn put_snapshot(&self, payload: &PushPayload) -> Result<(), Error> {
        let body = serde_json::to_string(payload)?;

        // text/plain keeps the backing blob service from preflighting
        // the request; the body is JSON regardless.
        let response = self
            .client
            .post(self.api_url.clone())
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::remote(format!(
                "upload rejected with status {}: {}",
                status, text
            )));
        }
        Ok(())
    }

    async fn fetch_snapshot(&self, username: &str) -> Result<RemoteSnapshot, Error> {
        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("username", username)
            // cache-busting timestamp, one per request
            .append_pair("t", &now_millis().to_string());

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::remote(format!(
                "download failed with status {}: {}",
                status, text
            )));
        }

        let value: serde_json::Value = response.json().await?;
        parse_record(username, value)
    }
}

/// Interpret a raw remote record: an error marker, or a snapshot
/// (optionally wrapped in a `data` envelope) plus an optional identity list
fn parse_record(username: &str, value: serde_json::Value) -> Result<RemoteSnapshot, Error> {
    if let Some(error) = value.get("error") {
        return Err(Error::remote(format!(
            "no record for {}: {}",
            username, error
        )));
    }

    let identity_list = value.get("identityList").and_then(|raw| {
        match serde_json::from_value::<Vec<User>>(raw.clone()) {
            Ok(list) => Some(list),
            Err(e) => {
                warn!("remote record for {} has a malformed identity list: {}", username, e);
                None
            }
        }
    });

    let data = if let Some(enveloped) = value.get("data") {
        Some(serde_json::from_value::<SnapshotPatch>(enveloped.clone())?)
    } else if value.get("transactions").map_or(false, |t| t.is_array()) {
        Some(serde_json::from_value::<SnapshotPatch>(value)?)
    } else {
        None
    };

    Ok(RemoteSnapshot {
        identity_list,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_marker_maps_to_remote_error() {
        let result = parse_record("sara", json!({ "error": "not found" }));
        assert!(matches!(result, Err(Error::Remote(_))));
    }

    #[test]
    fn enveloped_record_yields_data_and_identity_list() {
        let snapshot = parse_record(
            "talal",
            json!({
                "identityList": [
                    { "id": 1, "username": "talal", "secret": "00966",
                      "displayName": "T", "role": "admin" }
                ],
                "data": { "transactions": [], "lastSync": 5 }
            }),
        )
        .unwrap();
        assert_eq!(snapshot.identity_list.unwrap().len(), 1);
        assert_eq!(snapshot.data.unwrap().last_sync, Some(5));
    }

    #[test]
    fn bare_record_is_accepted_as_snapshot() {
        let snapshot = parse_record("khaled", json!({ "transactions": [], "stock": { "jawwy": 3 } }))
            .unwrap();
        let patch = snapshot.data.unwrap();
        assert_eq!(patch.stock.unwrap().jawwy, 3);
        assert!(snapshot.identity_list.is_none());
    }

    #[test]
    fn record_without_data_or_error_yields_empty_snapshot() {
        let snapshot = parse_record("khaled", json!({ "status": "ok" })).unwrap();
        assert!(snapshot.data.is_none());
        assert!(snapshot.identity_list.is_none());
    }
}
