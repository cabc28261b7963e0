//! reqwest-backed transport
//!
//! reqwest uses the browser `fetch` API on wasm32, so the same code drives the
//! deployed client and native builds. Streaming bodies come through
//! `Response::bytes_stream()`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::{
    BindingSubscription, BindingTransport, ByteStream, HelperRequest, MigrationTransport,
    TransportError, WatchEvent, WatchPayload,
};
use crate::features::binding::Platform;
use crate::services::config::ClientConfig;
use crate::services::session::Credential;
use crate::services::streaming::{FrameDecoder, SseFrame};

#[derive(Debug, Deserialize)]
struct InitResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct BindingsResponse {
    #[serde(default)]
    bindings: Vec<String>,
}

/// HTTP transport for the platform API and the local verifier helper.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http_client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint_url(path)
    }

    // The platform expects the bare token, not a `Bearer` scheme.
    fn authorized(builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        builder.header(header::AUTHORIZATION, credential.as_str())
    }

    async fn send(builder: RequestBuilder) -> Result<Response, TransportError> {
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Connect {
                message: e.to_string(),
            })?;
        check_status(response).await
    }
}

/// Turn a non-2xx response into a `TransportError`, keeping the server's
/// `{"error": ...}` message when there is one.
async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            }
        });

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(TransportError::Unauthorized { message })
    } else {
        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

fn body_stream(response: Response) -> ByteStream {
    Box::pin(response.bytes_stream().map(|chunk| {
        chunk.map_err(|e| TransportError::Network {
            message: e.to_string(),
        })
    }))
}

#[async_trait(?Send)]
impl BindingTransport for HttpTransport {
    #[instrument(skip(self, credential), err)]
    async fn init_binding(
        &self,
        platform: Platform,
        credential: &Credential,
    ) -> Result<String, TransportError> {
        let request = self
            .http_client
            .post(self.url(&self.config.endpoints.init_binding))
            .json(&json!({ "platform": platform }));
        let response = Self::send(Self::authorized(request, credential)).await?;

        let init: InitResponse = response.json().await.map_err(|e| TransportError::Decode {
            message: e.to_string(),
        })?;
        if init.session_id.is_empty() {
            return Err(TransportError::Decode {
                message: "empty session_id".to_string(),
            });
        }
        info!("Verification session {} created for {}", init.session_id, platform);
        Ok(init.session_id)
    }

    #[instrument(skip(self), err)]
    async fn watch_binding(
        &self,
        session_id: &str,
    ) -> Result<Box<dyn BindingSubscription>, TransportError> {
        let request = self
            .http_client
            .get(self.url(&self.config.endpoints.watch_binding))
            .query(&[("session_id", session_id)])
            .header(header::ACCEPT, "text/event-stream");

        // Headers received: the server is now listening for this session.
        let response = Self::send(request).await?;
        debug!("Watch channel open for {}", session_id);
        Ok(Box::new(SseSubscription::new(
            session_id.to_string(),
            body_stream(response),
        )))
    }

    #[instrument(skip(self), err)]
    async fn notify_helper(&self, request: &HelperRequest) -> Result<(), TransportError> {
        let builder = self
            .http_client
            .post(&self.config.helper.verify_url)
            .json(request);
        Self::send(builder).await?;
        Ok(())
    }

    async fn cancel_binding(&self, session_id: &str) -> Result<(), TransportError> {
        let builder = self
            .http_client
            .post(self.url(&self.config.endpoints.cancel_binding))
            .json(&json!({ "session_id": session_id }));
        Self::send(builder).await?;
        Ok(())
    }

    #[instrument(skip(self, credential), err)]
    async fn unbind(
        &self,
        platform: Platform,
        credential: &Credential,
    ) -> Result<(), TransportError> {
        let request = self
            .http_client
            .post(self.url(&self.config.endpoints.unbind))
            .json(&json!({ "platform": platform }));
        Self::send(Self::authorized(request, credential)).await?;
        Ok(())
    }

    async fn list_bindings(
        &self,
        credential: &Credential,
    ) -> Result<Vec<Platform>, TransportError> {
        let request = self
            .http_client
            .get(self.url(&self.config.endpoints.bindings));
        let response = Self::send(Self::authorized(request, credential)).await?;
        let listed: BindingsResponse =
            response.json().await.map_err(|e| TransportError::Decode {
                message: e.to_string(),
            })?;

        Ok(listed
            .bindings
            .iter()
            .filter_map(|name| match name.parse::<Platform>() {
                Ok(platform) => Some(platform),
                Err(_) => {
                    warn!("Ignoring binding for unknown platform '{}'", name);
                    None
                }
            })
            .collect())
    }
}

#[async_trait(?Send)]
impl MigrationTransport for HttpTransport {
    #[instrument(skip(self, credential), err)]
    async fn start_migration(
        &self,
        source_url: &str,
        credential: Option<&Credential>,
    ) -> Result<ByteStream, TransportError> {
        let mut request = self
            .http_client
            .post(self.url(&self.config.endpoints.migrate))
            .json(&json!({ "url": source_url }));
        if let Some(credential) = credential {
            request = Self::authorized(request, credential);
        }
        let response = Self::send(request).await?;
        Ok(body_stream(response))
    }
}

/// Server-push subscription read from a `text/event-stream` body.
pub struct SseSubscription {
    session_id: String,
    body: Option<ByteStream>,
    decoder: FrameDecoder,
    queued: VecDeque<WatchEvent>,
}

impl SseSubscription {
    pub fn new(session_id: String, body: ByteStream) -> Self {
        Self {
            session_id,
            body: Some(body),
            decoder: FrameDecoder::new(),
            queued: VecDeque::new(),
        }
    }

    fn enqueue(&mut self, frames: Vec<SseFrame>) {
        for frame in frames {
            // Only unnamed (`message`) events carry status updates.
            if let Some(event) = frame.event.as_deref().filter(|e| *e != "message") {
                debug!("Ignoring '{}' event for {}", event, self.session_id);
                continue;
            }
            match serde_json::from_str::<WatchPayload>(&frame.data) {
                Ok(payload) => self.queued.push_back(WatchEvent {
                    session_id: self.session_id.clone(),
                    payload,
                }),
                Err(e) => warn!(
                    "Ignoring malformed watch frame for {}: {}",
                    self.session_id, e
                ),
            }
        }
    }
}

impl Stream for SseSubscription {
    type Item = Result<WatchEvent, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.queued.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            let Some(body) = this.body.as_mut() else {
                return Poll::Ready(None);
            };
            match body.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(chunk))) => {
                    let frames = this.decoder.push(&chunk);
                    this.enqueue(frames);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.body = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.body = None;
                    let frames = this.decoder.finish();
                    this.enqueue(frames);
                }
            }
        }
    }
}

impl BindingSubscription for SseSubscription {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn close(&mut self) {
        if self.body.take().is_some() {
            debug!("Watch channel closed for {}", self.session_id);
        }
        self.queued.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    fn chunked(parts: &[&str]) -> ByteStream {
        let items: Vec<Result<Bytes, TransportError>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn test_subscription_stamps_and_orders_events() {
        let mut sub = SseSubscription::new(
            "sess-1".to_string(),
            chunked(&[
                "data: {\"status\":\"pend",
                "ing\"}\n\ndata: {\"status\":\"authenticated\",\"error\":null}\n",
                "\n",
            ]),
        );

        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.session_id, "sess-1");
        assert_eq!(first.payload.status, "pending");

        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.payload.status, "authenticated");

        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_watch_frame_is_skipped() {
        let mut sub = SseSubscription::new(
            "sess-1".to_string(),
            chunked(&["data: {oops\n\ndata: {\"status\":\"failed\",\"error\":\"Login failed\"}\n\n"]),
        );
        let event = sub.next().await.unwrap().unwrap();
        assert_eq!(event.payload.error.as_deref(), Some("Login failed"));
    }

    #[tokio::test]
    async fn test_named_events_are_not_status_updates() {
        let mut sub = SseSubscription::new(
            "sess-1".to_string(),
            chunked(&[
                "event: ping\ndata: {\"status\":\"authenticated\"}\n\n",
                "event: message\ndata: {\"status\":\"failed\"}\n\n",
            ]),
        );
        let event = sub.next().await.unwrap().unwrap();
        assert_eq!(event.payload.status, "failed");
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_stops_delivery() {
        let mut sub = SseSubscription::new(
            "sess-1".to_string(),
            chunked(&["data: {\"status\":\"authenticated\"}\n\n"]),
        );
        sub.close();
        sub.close();
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced_once() {
        let items: Vec<Result<Bytes, TransportError>> = vec![Err(TransportError::Network {
            message: "reset".to_string(),
        })];
        let mut sub = SseSubscription::new("sess-1".to_string(), Box::pin(stream::iter(items)));
        assert!(matches!(
            sub.next().await,
            Some(Err(TransportError::Network { .. }))
        ));
        assert!(sub.next().await.is_none());
    }
}
