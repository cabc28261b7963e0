use crate::services::errors::WorkflowError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

/// The single affordance the migration dialog offers for a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobControls {
    /// URL input and start button.
    Start,
    Cancel,
    /// Close and open the created article, when the server named one.
    Close { result_id: Option<String> },
    /// Close; a retry starts a fresh job.
    Reset,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationJob {
    pub source_url: String,
    pub state: JobState,
    /// Append-only, in arrival order.
    pub log: Vec<String>,
    pub result_id: Option<String>,
    /// One entry per frame that could not be interpreted.
    pub diagnostics: Vec<WorkflowError>,
    /// Why a Failed or Aborted job ended.
    pub failure: Option<WorkflowError>,
}

impl MigrationJob {
    pub fn running(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            state: JobState::Running,
            ..Self::default()
        }
    }

    pub fn controls(&self) -> JobControls {
        match self.state {
            JobState::Idle => JobControls::Start,
            JobState::Running => JobControls::Cancel,
            JobState::Succeeded => JobControls::Close {
                result_id: self.result_id.clone(),
            },
            JobState::Failed | JobState::Aborted => JobControls::Reset,
        }
    }

    /// A finished job may be run again with the same URL unless the failure
    /// needs the user to act first.
    pub fn can_retry(&self) -> bool {
        matches!(self.state, JobState::Failed | JobState::Aborted)
            && self
                .failure
                .as_ref()
                .is_some_and(WorkflowError::is_restartable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_follow_state() {
        let mut job = MigrationJob::default();
        assert_eq!(job.controls(), JobControls::Start);

        job = MigrationJob::running("https://blog.csdn.net/a/1");
        assert_eq!(job.controls(), JobControls::Cancel);

        job.state = JobState::Succeeded;
        assert_eq!(job.controls(), JobControls::Close { result_id: None });
        job.result_id = Some("abc123".to_string());
        assert_eq!(
            job.controls(),
            JobControls::Close {
                result_id: Some("abc123".to_string())
            }
        );

        for state in [JobState::Failed, JobState::Aborted] {
            job.state = state;
            assert_eq!(job.controls(), JobControls::Reset);
        }
    }

    #[test]
    fn test_retry_depends_on_failure() {
        let mut job = MigrationJob::running("https://example.com/a");
        job.failure = Some(WorkflowError::NetworkError {
            message: "connection reset".to_string(),
        });
        assert!(!job.can_retry());

        job.state = JobState::Failed;
        assert!(job.can_retry());

        job.failure = Some(WorkflowError::Unauthorized {
            message: "token expired".to_string(),
        });
        assert!(!job.can_retry());

        job.state = JobState::Aborted;
        job.failure = Some(WorkflowError::UserCancelled);
        assert!(job.can_retry());
    }
}
