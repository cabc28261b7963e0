//! Workflows
//!
//! - **binding**: cross-device account binding through the local verifier helper
//! - **migration**: server-driven article import over a progress stream
//! - **progress**: the observer both workflows report to

pub mod binding;
pub mod migration;
pub mod progress;

pub use binding::{HandshakeCoordinator, Platform};
pub use migration::{JobControls, JobState, MigrationController};
pub use progress::ProgressSink;
