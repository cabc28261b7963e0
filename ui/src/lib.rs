//! Client-side workflows for the Megacite publishing platform: binding
//! third-party accounts and migrating external articles.

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub use app::{AppServices, DashboardPage, SettingsPage};

#[cfg(feature = "web")]
pub mod components;
pub mod features;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;
