//! Client configuration
//!
//! Defaults mirror the deployed site: the verifier helper listens on the
//! loopback address and session data lives under the `mc_*` storage keys.

#[cfg(feature = "web")]
use crate::console_warn;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Origin of the publishing platform, e.g. `https://example.org`.
    pub server_origin: String,
    pub helper: HelperConfig,
    pub storage: StorageKeys,
    pub watch: WatchConfig,
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HelperConfig {
    /// Where the local verifier helper accepts verification requests.
    pub verify_url: String,
    /// Shown to the user when the helper is not running. `{server}` is
    /// replaced with the platform origin.
    pub launch_command: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageKeys {
    pub token: String,
    pub identity: String,
    pub pending_notice: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// How many times a push connection that closed cleanly (no terminal
    /// event) is re-opened for the same session. `None` keeps re-opening
    /// until a terminal event, an error or an explicit abort.
    pub reconnect_limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub init_binding: String,
    pub watch_binding: String,
    pub cancel_binding: String,
    pub unbind: String,
    pub bindings: String,
    pub migrate: String,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            verify_url: "http://127.0.0.1:9999/verify".to_string(),
            launch_command: "python client/verifier.py --server {server}".to_string(),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            token: "mc_token".to_string(),
            identity: "mc_username".to_string(),
            pending_notice: "mc_pending_toast".to_string(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            reconnect_limit: None,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            init_binding: "/api/auth/init".to_string(),
            watch_binding: "/api/auth/watch".to_string(),
            cancel_binding: "/api/auth/cancel".to_string(),
            unbind: "/api/auth/unbind".to_string(),
            bindings: "/api/auth/bindings".to_string(),
            migrate: "/api/post/migrate".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_origin: "http://localhost:8000".to_string(),
            helper: HelperConfig::default(),
            storage: StorageKeys::default(),
            watch: WatchConfig::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            server_origin: origin.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Configuration for the page the client is running on.
    #[cfg(feature = "web")]
    pub fn from_window() -> Self {
        match web_sys::window().and_then(|w| w.location().origin().ok()) {
            Some(origin) => Self::with_origin(origin),
            None => {
                console_warn!("[Config] No window origin available, using defaults");
                Self::default()
            }
        }
    }

    /// Absolute URL for one of the platform endpoints.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.server_origin, path)
    }

    /// Instruction telling the user how to start the helper for this origin.
    pub fn helper_launch_command(&self) -> String {
        self.helper
            .launch_command
            .replace("{server}", &self.server_origin)
    }

    /// Returns the config with any nonsensical values replaced by defaults.
    pub fn validated(mut self) -> Self {
        if self.server_origin.trim().is_empty() {
            console_warn!("[Config] Empty server origin, falling back to default");
            self.server_origin = ClientConfig::default().server_origin;
        }
        if self.helper.verify_url.trim().is_empty() {
            console_warn!("[Config] Empty helper URL, falling back to default");
            self.helper.verify_url = HelperConfig::default().verify_url;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_is_normalized() {
        let config = ClientConfig::with_origin("https://example.org/");
        assert_eq!(config.server_origin, "https://example.org");
        assert_eq!(
            config.endpoint_url(&config.endpoints.migrate),
            "https://example.org/api/post/migrate"
        );
    }

    #[test]
    fn test_launch_command_mentions_origin() {
        let config = ClientConfig::with_origin("https://example.org");
        assert_eq!(
            config.helper_launch_command(),
            "python client/verifier.py --server https://example.org"
        );
    }

    #[test]
    fn test_watch_reconnects_without_limit_by_default() {
        assert_eq!(ClientConfig::default().watch.reconnect_limit, None);
    }

    #[test]
    fn test_validated_restores_defaults() {
        let mut config = ClientConfig::with_origin("");
        config.helper.verify_url = " ".to_string();
        let config = config.validated();
        assert_eq!(config.server_origin, "http://localhost:8000");
        assert_eq!(config.helper.verify_url, "http://127.0.0.1:9999/verify");
    }
}
