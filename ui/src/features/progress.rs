//! Progress reporting for the long-running workflows
//!
//! The controllers push human-readable lines, toasts and affordance changes
//! here. Implementations only observe; they never call back into a controller.

use crate::features::migration::JobControls;

pub trait ProgressSink {
    /// One line of workflow narration, in arrival order.
    fn log_line(&self, line: &str);

    /// Short transient message (toast).
    fn notify(&self, message: &str);

    /// The set of controls the UI should offer changed.
    fn controls_changed(&self, _controls: &JobControls) {}
}
