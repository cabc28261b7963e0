//! Handshake coordinator
//!
//! Drives one binding at a time through three parties:
//!
//! 1. `init-binding` on the server yields a session id
//! 2. a push subscription for that id is opened and acknowledged
//! 3. the local helper is asked to start the interactive login
//!
//! The helper is only contacted once the subscription is listening, so its
//! report to the server can never arrive before anyone is waiting for it.

use std::cell::{Cell, RefCell};
use std::future::{poll_fn, Future};
use std::rc::Rc;
use std::task::Poll;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{HandshakeSession, HandshakeState, Platform};
use crate::features::progress::ProgressSink;
use crate::services::config::ClientConfig;
use crate::services::errors::WorkflowError;
use crate::services::host::PageHost;
use crate::services::session::{Credential, SessionStore};
use crate::services::transport::{
    BindingSubscription, BindingTransport, HelperRequest, TransportError, WatchEvent, WatchStatus,
};

const STARTING_HELPER: &str = "Starting the verification client...";
const HELPER_STARTED: &str =
    "Verification client started, finish signing in in the browser window it opened";
const BIND_SUCCEEDED: &str = "Binding succeeded!";
const BIND_CANCELLED: &str = "cancelled by user";
const UNBIND_SUCCEEDED: &str = "Binding removed";
const UNBIND_FAILED: &str = "Unbind failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnbindOutcome {
    /// The user dismissed the confirmation prompt.
    Declined,
    /// Unbound; carries the freshly fetched binding list.
    Unbound { bindings: Vec<Platform> },
}

/// The live push subscription. Shared with the pump so teardown can close it
/// synchronously even while `wait_for_outcome` is waiting on it.
type SubscriptionSlot = Rc<RefCell<Option<Box<dyn BindingSubscription>>>>;

struct ActiveHandshake {
    session: HandshakeSession,
    subscription: SubscriptionSlot,
    pumping: Rc<Cell<bool>>,
    cancel: CancellationToken,
}

/// Marks a session as pumped for as long as `wait_for_outcome` is alive.
struct PumpGuard(Rc<Cell<bool>>);

impl Drop for PumpGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// Borrows the slot only inside each poll, never across a suspension.
fn next_event(
    slot: &SubscriptionSlot,
) -> impl Future<Output = Option<Result<WatchEvent, TransportError>>> + '_ {
    poll_fn(move |cx| match slot.borrow_mut().as_mut() {
        Some(subscription) => subscription.poll_next_unpin(cx),
        None => Poll::Ready(None),
    })
}

fn close_slot(slot: &SubscriptionSlot) {
    let subscription = slot.borrow_mut().take();
    if let Some(mut subscription) = subscription {
        debug!("Closing watch channel for {}", subscription.session_id());
        subscription.close();
    }
}

enum WatchStep {
    Cancelled,
    Event(Option<Result<WatchEvent, TransportError>>),
}

pub struct HandshakeCoordinator {
    transport: Rc<dyn BindingTransport>,
    sessions: Rc<dyn SessionStore>,
    host: Rc<dyn PageHost>,
    sink: Rc<dyn ProgressSink>,
    config: ClientConfig,
    active: RefCell<Option<ActiveHandshake>>,
    last: RefCell<Option<HandshakeSession>>,
    // Bumped by every begin/abort so a superseded `begin` stops after its await.
    generation: Cell<u64>,
}

impl HandshakeCoordinator {
    pub fn new(
        transport: Rc<dyn BindingTransport>,
        sessions: Rc<dyn SessionStore>,
        host: Rc<dyn PageHost>,
        sink: Rc<dyn ProgressSink>,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            sessions,
            host,
            sink,
            config,
            active: RefCell::new(None),
            last: RefCell::new(None),
            generation: Cell::new(0),
        }
    }

    /// Snapshot of the active session, or of the last one that finished.
    pub fn current(&self) -> Option<HandshakeSession> {
        if let Some(active) = self.active.borrow().as_ref() {
            return Some(active.session.clone());
        }
        self.last.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.borrow().is_some()
    }

    /// Full binding flow: [`begin`](Self::begin) then
    /// [`wait_for_outcome`](Self::wait_for_outcome).
    pub async fn bind(&self, platform: Platform) -> Result<Platform, WorkflowError> {
        self.begin(platform).await?;
        self.wait_for_outcome().await
    }

    /// Open a verification session and hand it to the local helper.
    ///
    /// Any session already in progress on this coordinator is torn down first.
    #[instrument(skip(self), err)]
    pub async fn begin(&self, platform: Platform) -> Result<String, WorkflowError> {
        let session = self.sessions.current().ok_or_else(|| {
            self.surface(WorkflowError::Unauthorized {
                message: "sign in before binding a platform".to_string(),
            })
        })?;

        self.abort();
        let generation = self.generation.get();

        let session_id = self
            .transport
            .init_binding(platform, &session.credential)
            .await
            .map_err(|e| self.surface(WorkflowError::from_init(e)))?;
        if self.generation.get() != generation {
            debug!("Binding {} superseded before subscribing", session_id);
            return Err(WorkflowError::UserCancelled);
        }

        self.sink.notify(STARTING_HELPER);

        let mut subscription = self
            .transport
            .watch_binding(&session_id)
            .await
            .map_err(|e| self.surface(WorkflowError::from_stream(e)))?;
        if self.generation.get() != generation {
            debug!("Binding {} superseded while subscribing", session_id);
            subscription.close();
            return Err(WorkflowError::UserCancelled);
        }

        *self.active.borrow_mut() = Some(ActiveHandshake {
            session: HandshakeSession::pending(session_id.clone(), platform),
            subscription: Rc::new(RefCell::new(Some(subscription))),
            pumping: Rc::new(Cell::new(false)),
            cancel: CancellationToken::new(),
        });
        info!("Watching verification session {}", session_id);

        let request = HelperRequest {
            session_id: session_id.clone(),
            platform,
            server_url: self.config.server_origin.clone(),
        };
        match self.transport.notify_helper(&request).await {
            Ok(()) => {
                self.sink.notify(HELPER_STARTED);
                Ok(session_id)
            }
            Err(err) => {
                warn!("Local helper request failed: {}", err);
                let error = match err {
                    TransportError::Connect { .. } => WorkflowError::LocalHelperUnreachable {
                        helper_url: self.config.helper.verify_url.clone(),
                        launch_command: self.config.helper_launch_command(),
                    },
                    other => WorkflowError::Rejected {
                        message: format!("The verification client refused the request: {}", other),
                    },
                };
                self.finish(
                    Some(&session_id),
                    HandshakeState::Failed,
                    Some(error.to_string()),
                );
                Err(self.surface(error))
            }
        }
    }

    /// Pump the push channel until the session reaches a terminal state.
    ///
    /// Returns the bound platform on success. On success the pending notice is
    /// stored and the host page reloaded so identity state is re-derived.
    pub async fn wait_for_outcome(&self) -> Result<Platform, WorkflowError> {
        let (session_id, platform, cancel, slot, _pump) = {
            let active = self.active.borrow();
            let active = active.as_ref().ok_or(WorkflowError::NoActiveSession)?;
            if active.pumping.replace(true) {
                return Err(WorkflowError::Busy {
                    operation: "watching this verification session".to_string(),
                });
            }
            (
                active.session.session_id.clone(),
                active.session.platform,
                active.cancel.clone(),
                active.subscription.clone(),
                PumpGuard(active.pumping.clone()),
            )
        };

        let mut reconnects: u32 = 0;
        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => WatchStep::Cancelled,
                event = next_event(&slot) => WatchStep::Event(event),
            };

            match step {
                // Whoever cancelled has already closed the subscription.
                WatchStep::Cancelled => return Err(WorkflowError::UserCancelled),
                WatchStep::Event(Some(Ok(event))) => {
                    if event.session_id != session_id {
                        debug!(
                            "Dropping event for {} while watching {}",
                            event.session_id, session_id
                        );
                        continue;
                    }
                    match event.payload.status() {
                        WatchStatus::Authenticated => {
                            close_slot(&slot);
                            if let Some(reported) = event.payload.platform.as_deref() {
                                if reported != platform.as_str() {
                                    warn!(
                                        "Session {} reported platform '{}', expected '{}'",
                                        session_id, reported, platform
                                    );
                                }
                            }
                            self.finish(Some(&session_id), HandshakeState::Authenticated, None);
                            info!("Platform {} bound", platform);
                            self.sessions.set_pending_notice(BIND_SUCCEEDED);
                            self.sink.notify(BIND_SUCCEEDED);
                            self.host.reload();
                            return Ok(platform);
                        }
                        WatchStatus::Failed => {
                            close_slot(&slot);
                            let message = event
                                .payload
                                .error
                                .filter(|e| !e.trim().is_empty())
                                .unwrap_or_else(|| "unknown error".to_string());
                            self.finish(
                                Some(&session_id),
                                HandshakeState::Failed,
                                Some(message.clone()),
                            );
                            self.sink.notify(&format!("Binding failed: {}", message));
                            return Err(WorkflowError::Rejected { message });
                        }
                        WatchStatus::Other(status) => {
                            debug!("Ignoring status '{}' for {}", status, session_id);
                        }
                    }
                }
                WatchStep::Event(Some(Err(err))) => {
                    close_slot(&slot);
                    let error = WorkflowError::from_stream(err);
                    self.finish(
                        Some(&session_id),
                        HandshakeState::Failed,
                        Some(error.to_string()),
                    );
                    return Err(self.surface(error));
                }
                WatchStep::Event(None) => {
                    close_slot(&slot);
                    let limit = self.config.watch.reconnect_limit;
                    if limit.is_some_and(|limit| reconnects >= limit) {
                        let error = WorkflowError::NetworkError {
                            message: "the watch channel closed before the binding finished"
                                .to_string(),
                        };
                        self.finish(
                            Some(&session_id),
                            HandshakeState::Failed,
                            Some(error.to_string()),
                        );
                        return Err(self.surface(error));
                    }
                    reconnects += 1;
                    debug!(
                        "Watch channel for {} closed cleanly, reconnecting (attempt {})",
                        session_id, reconnects
                    );

                    let reopened = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        result = self.transport.watch_binding(&session_id) => Some(result),
                    };
                    match reopened {
                        None => return Err(WorkflowError::UserCancelled),
                        Some(Ok(fresh)) => *slot.borrow_mut() = Some(fresh),
                        Some(Err(err)) => {
                            let error = WorkflowError::from_stream(err);
                            self.finish(
                                Some(&session_id),
                                HandshakeState::Failed,
                                Some(error.to_string()),
                            );
                            return Err(self.surface(error));
                        }
                    }
                }
            }
        }
    }

    /// Tear down the active session locally: stop the pump and close the push
    /// subscription. Takes effect before this call returns.
    pub fn abort(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
        if self.finish(None, HandshakeState::Failed, Some(BIND_CANCELLED.to_string())) {
            debug!("Active verification session aborted");
        }
    }

    /// [`abort`](Self::abort), then tell the server the session is abandoned.
    pub async fn cancel(&self) {
        let session_id = self
            .active
            .borrow()
            .as_ref()
            .map(|active| active.session.session_id.clone());
        self.abort();
        if let Some(session_id) = session_id {
            if let Err(e) = self.transport.cancel_binding(&session_id).await {
                warn!("Server-side cancel of {} failed: {}", session_id, e);
            }
        }
    }

    /// Platforms currently bound to the signed-in account.
    pub async fn bindings(&self) -> Result<Vec<Platform>, WorkflowError> {
        let credential = self.credential()?;
        self.transport
            .list_bindings(&credential)
            .await
            .map_err(WorkflowError::from_init)
    }

    /// Confirm with the user, unbind, then re-fetch the binding list.
    #[instrument(skip(self), err)]
    pub async fn unbind(&self, platform: Platform) -> Result<UnbindOutcome, WorkflowError> {
        let credential = self.credential()?;
        let prompt = format!(
            "Unbind {}? Articles from it will no longer sync automatically.",
            platform.display_name()
        );
        if !self.host.confirm(&prompt) {
            return Ok(UnbindOutcome::Declined);
        }

        if let Err(e) = self.transport.unbind(platform, &credential).await {
            self.sink.notify(UNBIND_FAILED);
            return Err(WorkflowError::from_init(e));
        }
        self.sink.notify(UNBIND_SUCCEEDED);
        let bindings = self.bindings().await?;
        Ok(UnbindOutcome::Unbound { bindings })
    }

    fn credential(&self) -> Result<Credential, WorkflowError> {
        self.sessions
            .current()
            .map(|session| session.credential)
            .ok_or_else(|| WorkflowError::Unauthorized {
                message: "not signed in".to_string(),
            })
    }

    fn surface(&self, error: WorkflowError) -> WorkflowError {
        self.sink.notify(&error.to_string());
        error
    }

    /// Retire the active session if it matches `session_id` (any session when
    /// `None`). Returns whether something was retired.
    fn finish(
        &self,
        session_id: Option<&str>,
        state: HandshakeState,
        error: Option<String>,
    ) -> bool {
        let retired = {
            let mut active = self.active.borrow_mut();
            let matches = active.as_ref().is_some_and(|a| {
                session_id.map_or(true, |id| a.session.session_id == id)
            });
            if matches {
                active.take()
            } else {
                None
            }
        };

        let Some(mut retired) = retired else {
            return false;
        };
        retired.cancel.cancel();
        close_slot(&retired.subscription);
        retired.session.state = state;
        retired.session.last_error = error;
        *self.last.borrow_mut() = Some(retired.session);
        true
    }
}
