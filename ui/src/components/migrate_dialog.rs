use std::rc::Rc;

use dioxus::prelude::*;

use crate::app::AppServices;
use crate::components::sink::SignalSink;
use crate::console_warn;
use crate::features::migration::{JobControls, MigrationController};

#[derive(Props, PartialEq, Clone)]
pub struct MigrateDialogProps {
    /// Called when the dialog is closed, with the new article's id on success.
    pub on_close: EventHandler<Option<String>>,
}

/// Import an external article and narrate the import as it runs.
#[component]
pub fn MigrateDialog(props: MigrateDialogProps) -> Element {
    let services = use_context::<AppServices>();
    let mut lines = use_signal(Vec::<String>::new);
    let toast = use_signal(|| None::<String>);
    let controls = use_signal(|| JobControls::Start);
    let mut url = use_signal(String::new);

    let controller = use_hook(|| {
        Rc::new(MigrationController::new(
            services.transport.clone(),
            services.sessions.clone(),
            Rc::new(SignalSink::new(lines, toast, controls)),
        ))
    });

    let on_close = props.on_close;
    let actions = match controls() {
        JobControls::Start => {
            let controller = controller.clone();
            rsx! {
                div {
                    class: "migrate-input-area",
                    input {
                        class: "input-field",
                        r#type: "url",
                        placeholder: "https://blog.csdn.net/...",
                        value: "{url}",
                        oninput: move |event| url.set(event.value()),
                    }
                    button {
                        class: "btn-action",
                        onclick: move |_| {
                            let controller = controller.clone();
                            let source = url();
                            lines.set(Vec::new());
                            spawn(async move {
                                if let Err(e) = controller.start(&source).await {
                                    console_warn!("[Migrate] {}", e);
                                }
                            });
                        },
                        "Start"
                    }
                    button {
                        class: "btn-action cancel",
                        onclick: move |_| on_close.call(None),
                        "Close"
                    }
                }
            }
        }
        JobControls::Cancel => {
            let controller = controller.clone();
            rsx! {
                button {
                    class: "btn-action cancel",
                    onclick: move |_| controller.cancel(),
                    "Stop"
                }
            }
        }
        JobControls::Close { result_id } => {
            let controller = controller.clone();
            rsx! {
                button {
                    class: "btn-action",
                    onclick: move |_| {
                        if let Err(e) = controller.dismiss() {
                            console_warn!("[Migrate] {}", e);
                        }
                        on_close.call(result_id.clone());
                    },
                    "Close"
                }
            }
        }
        JobControls::Reset => {
            let retry = controller.job().can_retry().then(|| controller.clone());
            let controller = controller.clone();
            rsx! {
                if let Some(retry) = retry {
                    button {
                        class: "btn-action",
                        onclick: move |_| {
                            let retry = retry.clone();
                            lines.set(Vec::new());
                            spawn(async move {
                                if let Err(e) = retry.retry().await {
                                    console_warn!("[Migrate] {}", e);
                                }
                            });
                        },
                        "Try again"
                    }
                }
                button {
                    class: "btn-action cancel",
                    onclick: move |_| {
                        if let Err(e) = controller.dismiss() {
                            console_warn!("[Migrate] {}", e);
                        }
                        lines.set(Vec::new());
                        on_close.call(None);
                    },
                    "Close"
                }
            }
        }
    };

    rsx! {
        div {
            class: "migrate-dialog",
            h2 { "Import an article" }
            if !lines.read().is_empty() {
                div {
                    class: "migrate-logs",
                    for (index, line) in lines.read().iter().enumerate() {
                        div { key: "{index}", "> {line}" }
                    }
                }
            }
            {actions}
            if let Some(message) = toast() {
                div { class: "toast", "{message}" }
            }
        }
    }
}
