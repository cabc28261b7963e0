//! The page the client is embedded in: confirmation prompts and reloads.

#[cfg(feature = "web")]
use crate::{console_error, console_warn};

pub trait PageHost {
    /// Ask the user to confirm a destructive action.
    fn confirm(&self, message: &str) -> bool;

    /// Full page reload, re-deriving identity state from storage.
    fn reload(&self);
}

#[cfg(feature = "web")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserHost;

#[cfg(feature = "web")]
impl PageHost for BrowserHost {
    fn confirm(&self, message: &str) -> bool {
        match web_sys::window() {
            Some(window) => window.confirm_with_message(message).unwrap_or(false),
            None => {
                console_warn!("[Host] No window, treating confirmation as declined");
                false
            }
        }
    }

    fn reload(&self) {
        let reloaded = web_sys::window().map(|w| w.location().reload());
        if !matches!(reloaded, Some(Ok(()))) {
            console_error!("[Host] Page reload failed");
        }
    }
}
