//! Session store
//!
//! The credential and identity are written by the login form (outside this
//! crate) and are read-only here. The only thing the workflows write is the
//! one-shot pending notice shown after a full page reload.

use std::cell::RefCell;
use std::fmt;

#[cfg(feature = "web")]
use gloo_storage::{LocalStorage, Storage};
use tracing::{debug, info};

#[cfg(feature = "web")]
use crate::services::config::StorageKeys;

/// Opaque bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credential: Credential,
    pub identity: String,
}

pub trait SessionStore {
    /// The signed-in session, or `None` when anonymous.
    fn current(&self) -> Option<Session>;

    /// Stores a message to show once after the next page load.
    fn set_pending_notice(&self, message: &str);

    /// Returns and clears the pending notice.
    fn take_pending_notice(&self) -> Option<String>;
}

/// Session store backed by `localStorage`, sharing keys with the rest of the site.
#[cfg(feature = "web")]
pub struct BrowserSessionStore {
    keys: StorageKeys,
}

#[cfg(feature = "web")]
impl BrowserSessionStore {
    pub fn new(keys: StorageKeys) -> Self {
        Self { keys }
    }

    // Values are plain strings, not JSON, so go through the raw Storage handle.
    fn read(&self, key: &str) -> Option<String> {
        LocalStorage::raw()
            .get_item(key)
            .ok()
            .flatten()
            .filter(|value| !value.is_empty())
    }
}

#[cfg(feature = "web")]
impl SessionStore for BrowserSessionStore {
    fn current(&self) -> Option<Session> {
        let token = self.read(&self.keys.token)?;
        let identity = self.read(&self.keys.identity)?;
        Some(Session {
            credential: Credential::new(token),
            identity,
        })
    }

    fn set_pending_notice(&self, message: &str) {
        if LocalStorage::raw()
            .set_item(&self.keys.pending_notice, message)
            .is_err()
        {
            tracing::warn!("Failed to store pending notice");
        }
    }

    fn take_pending_notice(&self) -> Option<String> {
        let notice = self.read(&self.keys.pending_notice)?;
        LocalStorage::delete(&self.keys.pending_notice);
        Some(notice)
    }
}

/// In-memory session store for native builds and tests.
#[derive(Default)]
pub struct MemorySessionStore {
    session: RefCell<Option<Session>>,
    pending_notice: RefCell<Option<String>>,
}

impl MemorySessionStore {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(token: &str, identity: &str) -> Self {
        let store = Self::default();
        store.sign_in(token, identity);
        store
    }

    pub fn sign_in(&self, token: &str, identity: &str) {
        info!("Session stored for {}", identity);
        *self.session.borrow_mut() = Some(Session {
            credential: Credential::new(token),
            identity: identity.to_string(),
        });
    }

    pub fn sign_out(&self) {
        self.session.borrow_mut().take();
    }
}

impl SessionStore for MemorySessionStore {
    fn current(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    fn set_pending_notice(&self, message: &str) {
        debug!("Pending notice set: {}", message);
        *self.pending_notice.borrow_mut() = Some(message.to_string());
    }

    fn take_pending_notice(&self) -> Option<String> {
        self.pending_notice.borrow_mut().take()
    }
}
