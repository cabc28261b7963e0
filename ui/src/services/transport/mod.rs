//! Transport layer
//!
//! Traits at the seam between the workflow controllers and the network, plus
//! the reqwest-backed implementation in [`http`]. Everything is `?Send`: the
//! client runs on the browser's single event loop.

pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::binding::Platform;
use crate::services::session::Credential;

pub use http::HttpTransport;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The connection could not be established at all.
    #[error("Connection failed: {message}")]
    Connect { message: String },

    /// The connection broke after it was established.
    #[error("Connection lost: {message}")]
    Network { message: String },

    #[error("Undecodable response: {message}")]
    Decode { message: String },
}

/// Incrementally delivered response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>>>>;

/// Body of the request that asks the local helper to start verifying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelperRequest {
    pub session_id: String,
    pub platform: Platform,
    /// Origin the helper reports the captured credentials back to.
    pub server_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchStatus {
    Authenticated,
    Failed,
    /// Anything else (`pending`, `invalid`, future states).
    Other(String),
}

/// One message pushed on the binding watch channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchPayload {
    pub status: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WatchPayload {
    pub fn status(&self) -> WatchStatus {
        match self.status.as_str() {
            "authenticated" => WatchStatus::Authenticated,
            "failed" => WatchStatus::Failed,
            other => WatchStatus::Other(other.to_string()),
        }
    }
}

/// A push event stamped with the session it was delivered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub session_id: String,
    pub payload: WatchPayload,
}

/// An open server-push subscription for one verification session.
///
/// Yields events in server-send order and ends once the server closed the
/// connection cleanly or after [`close`](Self::close).
pub trait BindingSubscription: Stream<Item = Result<WatchEvent, TransportError>> + Unpin {
    fn session_id(&self) -> &str;

    /// Release the connection. Safe to call more than once.
    fn close(&mut self);
}

#[async_trait(?Send)]
pub trait BindingTransport {
    /// `POST init-binding`: returns the server-issued session id.
    async fn init_binding(
        &self,
        platform: Platform,
        credential: &Credential,
    ) -> Result<String, TransportError>;

    /// `SUBSCRIBE watch-binding`: resolves once the subscription is listening.
    async fn watch_binding(
        &self,
        session_id: &str,
    ) -> Result<Box<dyn BindingSubscription>, TransportError>;

    /// Fire-and-forget request to the local helper.
    async fn notify_helper(&self, request: &HelperRequest) -> Result<(), TransportError>;

    /// Tell the server a session is abandoned.
    async fn cancel_binding(&self, session_id: &str) -> Result<(), TransportError>;

    async fn unbind(&self, platform: Platform, credential: &Credential)
        -> Result<(), TransportError>;

    /// Platforms currently bound to the account.
    async fn list_bindings(&self, credential: &Credential)
        -> Result<Vec<Platform>, TransportError>;
}

#[async_trait(?Send)]
pub trait MigrationTransport {
    /// `POST start-migration`: the response body streams progress frames.
    async fn start_migration(
        &self,
        source_url: &str,
        credential: Option<&Credential>,
    ) -> Result<ByteStream, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_payload_status_mapping() {
        let payload: WatchPayload =
            serde_json::from_str(r#"{"status":"failed","platform":"csdn","error":"Login failed"}"#)
                .unwrap();
        assert_eq!(payload.status(), WatchStatus::Failed);
        assert_eq!(payload.error.as_deref(), Some("Login failed"));

        let payload: WatchPayload = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(payload.status(), WatchStatus::Other("pending".to_string()));
        assert!(payload.error.is_none());
    }

    #[test]
    fn test_helper_request_wire_shape() {
        let request = HelperRequest {
            session_id: "sess-1".to_string(),
            platform: Platform::Juejin,
            server_url: "https://example.org".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "session_id": "sess-1",
                "platform": "juejin",
                "server_url": "https://example.org"
            })
        );
    }
}
