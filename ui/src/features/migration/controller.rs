//! Migration pipeline controller
//!
//! Submits an external article URL and narrates the server-side import as the
//! progress stream arrives. The response body is read chunk by chunk through a
//! [`FrameDecoder`]; the first terminal frame ends the job and releases the
//! stream.

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::frames::MigrationFrame;
use super::job::{JobControls, JobState, MigrationJob};
use crate::features::progress::ProgressSink;
use crate::services::errors::WorkflowError;
use crate::services::session::SessionStore;
use crate::services::streaming::{FrameDecoder, SseFrame};
use crate::services::transport::{ByteStream, MigrationTransport, TransportError};

const CONNECTING: &str = "Connecting to server...";
const OPERATION_ABORTED: &str = "Operation aborted.";
const USER_ABORTED: &str = "[cancelled] Migration aborted by user.";
const STREAM_ENDED: &str = "stream ended before a result was received";

/// How a single run ended.
enum Outcome {
    Succeeded(Option<String>),
    Rejected(WorkflowError),
    ConnectionLost(String),
    Cancelled,
}

pub struct MigrationController {
    transport: Rc<dyn MigrationTransport>,
    sessions: Rc<dyn SessionStore>,
    sink: Rc<dyn ProgressSink>,
    job: RefCell<MigrationJob>,
    // Present exactly while a job is Running.
    cancel: RefCell<Option<CancellationToken>>,
}

impl MigrationController {
    pub fn new(
        transport: Rc<dyn MigrationTransport>,
        sessions: Rc<dyn SessionStore>,
        sink: Rc<dyn ProgressSink>,
    ) -> Self {
        Self {
            transport,
            sessions,
            sink,
            job: RefCell::new(MigrationJob::default()),
            cancel: RefCell::new(None),
        }
    }

    pub fn job(&self) -> MigrationJob {
        self.job.borrow().clone()
    }

    pub fn controls(&self) -> JobControls {
        self.job.borrow().controls()
    }

    pub fn is_running(&self) -> bool {
        self.job.borrow().state == JobState::Running
    }

    /// Run one migration to completion. Resolves with the created article's
    /// content id, if the server reported one.
    #[instrument(skip(self), err)]
    pub async fn start(&self, source_url: &str) -> Result<Option<String>, WorkflowError> {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            let error = WorkflowError::InvalidInput {
                field: "url".to_string(),
                message: "enter the link of the article to migrate".to_string(),
            };
            self.sink.notify(&error.to_string());
            return Err(error);
        }
        if self.is_running() {
            return Err(WorkflowError::Busy {
                operation: "a migration".to_string(),
            });
        }

        let token = CancellationToken::new();
        *self.cancel.borrow_mut() = Some(token.clone());
        self.replace_job(MigrationJob::running(source_url));
        self.sink.log_line(CONNECTING);
        info!("Migrating {}", source_url);

        // Anonymous users may still try; the server decides.
        let credential = self.sessions.current().map(|session| session.credential);
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.transport.start_migration(source_url, credential.as_ref()) => Some(result),
        };

        let outcome = match opened {
            None => Outcome::Cancelled,
            Some(Ok(body)) => self.pump(body, &token).await,
            Some(Err(TransportError::Connect { message }))
            | Some(Err(TransportError::Network { message })) => Outcome::ConnectionLost(message),
            Some(Err(other)) => Outcome::Rejected(WorkflowError::from_init(other)),
        };

        self.cancel.borrow_mut().take();
        self.conclude(outcome)
    }

    /// Signal the in-flight request. Does nothing unless a job is Running.
    pub fn cancel(&self) {
        if !self.is_running() {
            return;
        }
        if let Some(token) = self.cancel.borrow().as_ref() {
            debug!("Cancelling migration");
            token.cancel();
        }
    }

    /// Forget the finished job and offer a fresh start.
    pub fn dismiss(&self) -> Result<(), WorkflowError> {
        if self.is_running() {
            return Err(WorkflowError::Busy {
                operation: "a migration".to_string(),
            });
        }
        self.replace_job(MigrationJob::default());
        Ok(())
    }

    /// Start the last finished job again with the same URL.
    pub async fn retry(&self) -> Result<Option<String>, WorkflowError> {
        let job = self.job();
        if !job.can_retry() {
            return Err(job.failure.unwrap_or(WorkflowError::InvalidInput {
                field: "url".to_string(),
                message: "there is no failed migration to retry".to_string(),
            }));
        }
        self.dismiss()?;
        self.start(&job.source_url).await
    }

    async fn pump(&self, mut body: ByteStream, token: &CancellationToken) -> Outcome {
        let mut decoder = FrameDecoder::new();
        loop {
            let read = tokio::select! {
                biased;
                _ = token.cancelled() => return Outcome::Cancelled,
                read = body.next() => read,
            };

            let frames = match read {
                Some(Ok(chunk)) => decoder.push(&chunk),
                Some(Err(TransportError::Network { message })) => {
                    return Outcome::ConnectionLost(message)
                }
                Some(Err(other)) => return Outcome::ConnectionLost(other.to_string()),
                None => {
                    let tail = decoder.finish();
                    return self
                        .dispatch_all(tail)
                        .unwrap_or_else(|| Outcome::ConnectionLost(STREAM_ENDED.to_string()));
                }
            };
            if let Some(outcome) = self.dispatch_all(frames) {
                return outcome;
            }
        }
    }

    /// Handle frames in order, stopping at the first terminal one. Anything
    /// after it in the same chunk is never looked at.
    fn dispatch_all(&self, frames: Vec<SseFrame>) -> Option<Outcome> {
        for frame in frames {
            match MigrationFrame::parse(&frame) {
                Ok(MigrationFrame::Step(step)) => self.append_log(&step),
                Ok(MigrationFrame::Success { cid }) => return Some(Outcome::Succeeded(cid)),
                Ok(MigrationFrame::Error(message)) => {
                    return Some(Outcome::Rejected(WorkflowError::Rejected { message }))
                }
                Err(diagnostic) => {
                    warn!("Skipping migration frame: {}", diagnostic);
                    self.job.borrow_mut().diagnostics.push(diagnostic);
                }
            }
        }
        None
    }

    fn conclude(&self, outcome: Outcome) -> Result<Option<String>, WorkflowError> {
        match outcome {
            Outcome::Succeeded(Some(cid)) => {
                info!("Migration finished, article {}", cid);
                self.sink
                    .log_line(&format!("[success] Article created (CID: {})", cid));
                self.finish(JobState::Succeeded, Some(cid.clone()));
                self.sink.notify("Article migrated");
                Ok(Some(cid))
            }
            Outcome::Succeeded(None) => {
                let diagnostic = WorkflowError::StreamProtocolError {
                    message: "success frame without a cid".to_string(),
                };
                warn!("Migration finished: {}", diagnostic);
                self.job.borrow_mut().diagnostics.push(diagnostic);
                self.sink.log_line("[success] Article created");
                self.finish(JobState::Succeeded, None);
                self.sink.notify("Article migrated");
                Ok(None)
            }
            Outcome::Rejected(error) => {
                self.append_log(&format!("[error] {}", error));
                self.append_log(OPERATION_ABORTED);
                self.fail(JobState::Failed, error)
            }
            Outcome::ConnectionLost(message) => {
                warn!("Migration stream failed: {}", message);
                self.append_log(&format!("[network error] {}", message));
                self.fail(JobState::Failed, WorkflowError::NetworkError { message })
            }
            Outcome::Cancelled => {
                self.append_log(USER_ABORTED);
                self.fail(JobState::Aborted, WorkflowError::UserCancelled)
            }
        }
    }

    fn fail(&self, state: JobState, error: WorkflowError) -> Result<Option<String>, WorkflowError> {
        self.job.borrow_mut().failure = Some(error.clone());
        self.finish(state, None);
        Err(error)
    }

    fn append_log(&self, line: &str) {
        self.job.borrow_mut().log.push(line.to_string());
        self.sink.log_line(line);
    }

    fn finish(&self, state: JobState, result_id: Option<String>) {
        let controls = {
            let mut job = self.job.borrow_mut();
            job.state = state;
            job.result_id = result_id;
            job.controls()
        };
        self.sink.controls_changed(&controls);
    }

    fn replace_job(&self, job: MigrationJob) {
        let controls = job.controls();
        *self.job.borrow_mut() = job;
        self.sink.controls_changed(&controls);
    }
}
