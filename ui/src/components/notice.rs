use dioxus::prelude::*;

use crate::app::AppServices;
use crate::services::session::SessionStore;

/// Shows the one-shot notice left behind before the last full page reload.
#[component]
pub fn PendingNotice() -> Element {
    let services = use_context::<AppServices>();
    let mut notice = use_signal(|| services.sessions.take_pending_notice());

    rsx! {
        if let Some(message) = notice() {
            div {
                class: "toast",
                onclick: move |_| notice.set(None),
                "{message}"
            }
        }
    }
}
