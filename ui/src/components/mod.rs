//! User Interface Components
//!
//! - **bindings**: platform binding rows driving the handshake coordinator
//! - **migrate_dialog**: article import dialog driving the migration controller
//! - **notice**: one-shot notice carried across a page reload
//! - **sink**: signal-backed progress sink shared by both workflows

pub mod bindings;
pub mod migrate_dialog;
pub mod notice;
pub mod sink;

pub use bindings::PlatformBindings;
pub use migrate_dialog::MigrateDialog;
pub use notice::PendingNotice;
pub use sink::SignalSink;
