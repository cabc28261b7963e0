use dioxus::prelude::*;

use crate::console_info;
use crate::features::migration::JobControls;
use crate::features::progress::ProgressSink;

/// Progress sink that writes into component signals, so a controller running
/// in a spawned task re-renders the component that owns it.
#[derive(Clone, Copy)]
pub struct SignalSink {
    lines: Signal<Vec<String>>,
    toast: Signal<Option<String>>,
    controls: Signal<JobControls>,
}

impl SignalSink {
    pub fn new(
        lines: Signal<Vec<String>>,
        toast: Signal<Option<String>>,
        controls: Signal<JobControls>,
    ) -> Self {
        Self {
            lines,
            toast,
            controls,
        }
    }
}

impl ProgressSink for SignalSink {
    fn log_line(&self, line: &str) {
        let mut lines = self.lines;
        lines.write().push(line.to_string());
    }

    fn notify(&self, message: &str) {
        console_info!("[Toast] {}", message);
        let mut toast = self.toast;
        toast.set(Some(message.to_string()));
    }

    fn controls_changed(&self, controls: &JobControls) {
        let mut current = self.controls;
        current.set(controls.clone());
    }
}
