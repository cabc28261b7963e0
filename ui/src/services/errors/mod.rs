//! Workflow error taxonomy
//!
//! Transport failures never reach callers as-is: each controller converts them
//! into one of the variants below at its boundary.

use thiserror::Error;

use crate::services::transport::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// No credential, or the server refused it.
    #[error("Not signed in: {message}")]
    Unauthorized { message: String },

    /// The server rejected the start of a workflow.
    #[error("Could not start: {message}")]
    InitError { message: String },

    /// The local verifier helper did not answer on the loopback address.
    #[error("Cannot reach the local verification client at {helper_url}. Make sure it is running.\nStart it with: {launch_command}")]
    LocalHelperUnreachable {
        helper_url: String,
        launch_command: String,
    },

    /// A frame on the stream could not be decoded.
    #[error("Malformed stream frame: {message}")]
    StreamProtocolError { message: String },

    /// The connection dropped before the workflow finished.
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Cancelled by user")]
    UserCancelled,

    /// The server finished the workflow with an explicit failure.
    #[error("{message}")]
    Rejected { message: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    /// A workflow of this kind is already running on this controller.
    #[error("Busy: {operation} is already in progress")]
    Busy { operation: String },

    #[error("No verification session is active")]
    NoActiveSession,
}

impl WorkflowError {
    /// Whether the user can reasonably start the same workflow again.
    pub fn is_restartable(&self) -> bool {
        !matches!(
            self,
            WorkflowError::Unauthorized { .. } | WorkflowError::InvalidInput { .. }
        )
    }

    /// Maps a failure of the request that *starts* a workflow.
    pub fn from_init(error: TransportError) -> Self {
        match error {
            TransportError::Unauthorized { message } => WorkflowError::Unauthorized { message },
            TransportError::Connect { message } | TransportError::Network { message } => {
                WorkflowError::NetworkError { message }
            }
            other => WorkflowError::InitError {
                message: other.to_string(),
            },
        }
    }

    /// Maps a failure that happens once a workflow is under way.
    pub fn from_stream(error: TransportError) -> Self {
        match error {
            TransportError::Unauthorized { message } => WorkflowError::Unauthorized { message },
            TransportError::Decode { message } => WorkflowError::StreamProtocolError { message },
            TransportError::Connect { message } | TransportError::Network { message } => {
                WorkflowError::NetworkError { message }
            }
            TransportError::Status { status, message } => WorkflowError::NetworkError {
                message: format!("HTTP {}: {}", status, message),
            },
        }
    }
}
