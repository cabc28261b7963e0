//! Application shell: shared services and the two pages that host the workflows.

use std::rc::Rc;

use dioxus::prelude::*;

use crate::components::{MigrateDialog, PendingNotice, PlatformBindings};
use crate::console_info;
use crate::services::config::ClientConfig;
use crate::services::host::{BrowserHost, PageHost};
use crate::services::session::{BrowserSessionStore, SessionStore};
use crate::services::transport::HttpTransport;

/// Services shared by every page, provided once at the root as context.
#[derive(Clone)]
pub struct AppServices {
    pub config: ClientConfig,
    pub transport: Rc<HttpTransport>,
    pub sessions: Rc<BrowserSessionStore>,
    pub host: Rc<BrowserHost>,
}

impl AppServices {
    pub fn from_window() -> Self {
        let config = ClientConfig::from_window().validated();
        console_info!("[App] Using server {}", config.server_origin);
        Self {
            transport: Rc::new(HttpTransport::new(config.clone())),
            sessions: Rc::new(BrowserSessionStore::new(config.storage.clone())),
            host: Rc::new(BrowserHost),
            config,
        }
    }
}

/// Account settings: third-party platform bindings.
#[component]
pub fn SettingsPage() -> Element {
    let services = use_context::<AppServices>();
    let identity = services.sessions.current().map(|session| session.identity);

    rsx! {
        PendingNotice {}
        div {
            class: "settings-container",
            match identity {
                Some(identity) => rsx! {
                    p { class: "signed-in-as", "Signed in as {identity}" }
                    PlatformBindings {}
                },
                None => rsx! {
                    p { class: "signed-out", "Sign in to connect your blogging platforms." }
                },
            }
        }
    }
}

/// Dashboard with the article import dialog.
#[component]
pub fn DashboardPage() -> Element {
    let services = use_context::<AppServices>();
    let mut dialog_open = use_signal(|| false);

    rsx! {
        PendingNotice {}
        div {
            class: "dashboard-container",
            button {
                class: "btn-action",
                id: "btn-migrate-trigger",
                onclick: move |_| dialog_open.set(true),
                "Import article"
            }
            if dialog_open() {
                MigrateDialog {
                    on_close: move |result_id: Option<String>| {
                        dialog_open.set(false);
                        // A new article only shows up in the list after a reload.
                        if result_id.is_some() {
                            services.host.reload();
                        }
                    }
                }
            }
        }
    }
}
