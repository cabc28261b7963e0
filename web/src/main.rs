use dioxus::prelude::*;
use megacite_ui::{AppServices, DashboardPage, SettingsPage};

fn main() {
    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    use_context_provider(AppServices::from_window);

    rsx! {
        Router::<Route> {}
    }
}

#[derive(Clone, Routable, Debug, PartialEq)]
enum Route {
    #[layout(Shell)]
    #[route("/")]
    Dashboard {},
    #[route("/settings")]
    Settings {},
}

#[component]
fn Shell() -> Element {
    rsx! {
        nav {
            class: "top-nav",
            Link { to: Route::Dashboard {}, "Dashboard" }
            Link { to: Route::Settings {}, "Settings" }
        }
        Outlet::<Route> {}
    }
}

#[component]
fn Dashboard() -> Element {
    rsx! { DashboardPage {} }
}

#[component]
fn Settings() -> Element {
    rsx! { SettingsPage {} }
}
