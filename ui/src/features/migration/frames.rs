//! Migration progress frames
//!
//! Each `data:` payload on the migration stream is one JSON object:
//!
//! ```text
//! data: {"step": "Fetching article"}
//! data: {"success": true, "cid": "bafy..."}
//! data: {"error": "Unsupported site"}
//! ```

use serde::Deserialize;

use crate::services::errors::WorkflowError;
use crate::services::streaming::SseFrame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationFrame {
    /// Progress narration, no state change.
    Step(String),
    /// Terminal: the article was created. The content id is normally present.
    Success { cid: Option<String> },
    /// Terminal: the server gave up.
    Error(String),
}

#[derive(Debug, Default, Deserialize)]
struct RawFrame {
    #[serde(default)]
    step: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    cid: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl MigrationFrame {
    /// Interpret one stream frame. Fields are checked in the order the server
    /// writes them: `step`, then `success`, then `error`.
    pub fn parse(frame: &SseFrame) -> Result<Self, WorkflowError> {
        let raw: RawFrame =
            serde_json::from_str(&frame.data).map_err(|e| WorkflowError::StreamProtocolError {
                message: format!("{} in frame {:?}", e, frame.data),
            })?;

        if let Some(step) = non_empty(raw.step) {
            return Ok(MigrationFrame::Step(step));
        }
        if raw.success == Some(true) {
            return Ok(MigrationFrame::Success {
                cid: non_empty(raw.cid),
            });
        }
        if let Some(error) = non_empty(raw.error) {
            return Ok(MigrationFrame::Error(error));
        }

        Err(WorkflowError::StreamProtocolError {
            message: format!("unrecognised frame {:?}", frame.data),
        })
    }
}
