//! Third-party account binding
//!
//! Binds an external platform account to the signed-in user. The server
//! cannot reach the user's machine, so a locally running verifier helper does
//! the interactive login and reports back to the server. This client sits in
//! the middle: it opens the server session, listens on the push channel and
//! pokes the helper.

pub mod coordinator;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use coordinator::{HandshakeCoordinator, UnbindOutcome};

/// Platforms the verifier helper knows how to log into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Csdn,
    Juejin,
    Jianshu,
    Cnblogs,
    Yuque,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Csdn,
        Platform::Juejin,
        Platform::Jianshu,
        Platform::Cnblogs,
        Platform::Yuque,
    ];

    /// Wire name, as used by the server and the helper.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Csdn => "csdn",
            Platform::Juejin => "juejin",
            Platform::Jianshu => "jianshu",
            Platform::Cnblogs => "cnblogs",
            Platform::Yuque => "yuque",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Csdn => "CSDN",
            Platform::Juejin => "Juejin",
            Platform::Jianshu => "Jianshu",
            Platform::Cnblogs => "Cnblogs",
            Platform::Yuque => "Yuque",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Pending,
    Authenticated,
    Failed,
}

/// A verification session as seen by this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeSession {
    pub session_id: String,
    pub platform: Platform,
    pub state: HandshakeState,
    pub last_error: Option<String>,
}

impl HandshakeSession {
    pub fn pending(session_id: String, platform: Platform) -> Self {
        Self {
            session_id,
            platform,
            state: HandshakeState::Pending,
            last_error: None,
        }
    }
}
