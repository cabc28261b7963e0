use std::rc::Rc;

use dioxus::prelude::*;

use crate::app::AppServices;
use crate::components::sink::SignalSink;
use crate::features::binding::{HandshakeCoordinator, Platform, UnbindOutcome};
use crate::features::migration::JobControls;
use crate::services::errors::WorkflowError;
use crate::{console_info, console_warn};

/// One row per platform with bind / unbind actions.
#[component]
pub fn PlatformBindings() -> Element {
    let services = use_context::<AppServices>();
    let lines = use_signal(Vec::<String>::new);
    let toast = use_signal(|| None::<String>);
    let controls = use_signal(|| JobControls::Start);
    let mut bound = use_signal(Vec::<Platform>::new);
    let mut waiting = use_signal(|| None::<Platform>);

    let coordinator = use_hook(|| {
        Rc::new(HandshakeCoordinator::new(
            services.transport.clone(),
            services.sessions.clone(),
            services.host.clone(),
            Rc::new(SignalSink::new(lines, toast, controls)),
            services.config.clone(),
        ))
    });

    let loader = coordinator.clone();
    use_future(move || {
        let coordinator = loader.clone();
        async move {
            match coordinator.bindings().await {
                Ok(platforms) => bound.set(platforms),
                Err(e) => console_warn!("[Bindings] Could not load bindings: {}", e),
            }
        }
    });

    let canceller = coordinator.clone();

    rsx! {
        div {
            class: "platform-bindings",
            h2 { "Connected platforms" }

            for platform in Platform::ALL {
                {
                    let is_bound = bound.read().contains(&platform);
                    let bind_with = coordinator.clone();
                    let unbind_with = coordinator.clone();
                    rsx! {
                        div {
                            key: "{platform}",
                            class: "binding-row",
                            span { class: "platform-name", "{platform.display_name()}" }
                            if is_bound {
                                span { class: "binding-status bound", "Bound" }
                                button {
                                    class: "btn-action cancel",
                                    disabled: waiting().is_some(),
                                    onclick: move |_| {
                                        let coordinator = unbind_with.clone();
                                        spawn(async move {
                                            match coordinator.unbind(platform).await {
                                                Ok(UnbindOutcome::Unbound { bindings }) => bound.set(bindings),
                                                Ok(UnbindOutcome::Declined) => {}
                                                Err(e) => console_warn!("[Bindings] Unbind of {} failed: {}", platform, e),
                                            }
                                        });
                                    },
                                    "Unbind"
                                }
                            } else {
                                span { class: "binding-status", "Not bound" }
                                button {
                                    class: "btn-action",
                                    disabled: waiting().is_some(),
                                    onclick: move |_| {
                                        let coordinator = bind_with.clone();
                                        waiting.set(Some(platform));
                                        spawn(async move {
                                            match coordinator.bind(platform).await {
                                                Ok(_) => console_info!("[Bindings] {} bound, reloading", platform),
                                                Err(WorkflowError::UserCancelled) => {}
                                                Err(e) => console_warn!("[Bindings] Binding {} failed: {}", platform, e),
                                            }
                                            waiting.set(None);
                                        });
                                    },
                                    if waiting() == Some(platform) { "Waiting for verification..." } else { "Bind" }
                                }
                            }
                        }
                    }
                }
            }

            if waiting().is_some() {
                button {
                    class: "btn-action cancel",
                    onclick: move |_| {
                        let coordinator = canceller.clone();
                        spawn(async move { coordinator.cancel().await });
                    },
                    "Cancel verification"
                }
            }

            if let Some(message) = toast() {
                div { class: "toast", "{message}" }
            }
        }
    }
}
