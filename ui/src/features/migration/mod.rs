//! Article migration
//!
//! The server fetches an external article, converts it and stores it as a new
//! post, narrating each step on a `text/event-stream` response.

pub mod controller;
pub mod frames;
pub mod job;

pub use controller::MigrationController;
pub use frames::MigrationFrame;
pub use job::{JobControls, JobState, MigrationJob};
