//! Scripted transports and recording observers shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, Stream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::features::binding::Platform;
use crate::features::migration::JobControls;
use crate::features::progress::ProgressSink;
use crate::services::host::PageHost;
use crate::services::session::Credential;
use crate::services::transport::{
    BindingSubscription, BindingTransport, ByteStream, HelperRequest, MigrationTransport,
    TransportError, WatchEvent, WatchPayload,
};

pub fn status(status: &str) -> WatchPayload {
    WatchPayload {
        status: status.to_string(),
        platform: None,
        error: None,
    }
}

pub fn authenticated() -> WatchPayload {
    status("authenticated")
}

pub fn failed(message: &str) -> WatchPayload {
    WatchPayload {
        error: Some(message.to_string()),
        ..status("failed")
    }
}

/// What a scripted watch channel does after its scripted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEnd {
    /// The server closes the connection cleanly.
    Close,
    /// The connection stays open until the test sends more or it is closed.
    HoldOpen,
}

type WatchItem = Result<WatchEvent, TransportError>;

struct WatchScript {
    session_id: String,
    events: Vec<WatchPayload>,
    end: WatchEnd,
}

struct OpenedWatch {
    session_id: String,
    sender: Option<UnboundedSender<WatchItem>>,
    closes: Rc<Cell<usize>>,
}

struct ScriptedSubscription {
    session_id: String,
    receiver: Option<UnboundedReceiver<WatchItem>>,
    closes: Rc<Cell<usize>>,
}

impl Stream for ScriptedSubscription {
    type Item = WatchItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<WatchItem>> {
        match self.get_mut().receiver.as_mut() {
            Some(receiver) => receiver.poll_recv(cx),
            None => Poll::Ready(None),
        }
    }
}

impl BindingSubscription for ScriptedSubscription {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn close(&mut self) {
        if self.receiver.take().is_some() {
            self.closes.set(self.closes.get() + 1);
        }
    }
}

/// Binding transport whose server and helper behaviour is set up per test.
pub struct ScriptedBindingTransport {
    inits: RefCell<VecDeque<Result<String, TransportError>>>,
    scripts: RefCell<VecDeque<WatchScript>>,
    opened: RefCell<Vec<OpenedWatch>>,
    helper_result: RefCell<Result<(), TransportError>>,
    helper_requests: RefCell<Vec<HelperRequest>>,
    cancelled: RefCell<Vec<String>>,
    bindings: RefCell<Vec<Platform>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedBindingTransport {
    pub fn new() -> Self {
        Self {
            inits: RefCell::new(VecDeque::new()),
            scripts: RefCell::new(VecDeque::new()),
            opened: RefCell::new(Vec::new()),
            helper_result: RefCell::new(Ok(())),
            helper_requests: RefCell::new(Vec::new()),
            cancelled: RefCell::new(Vec::new()),
            bindings: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn push_init(&self, result: Result<&str, TransportError>) {
        self.inits
            .borrow_mut()
            .push_back(result.map(str::to_string));
    }

    pub fn script_watch(&self, session_id: &str, events: Vec<WatchPayload>, end: WatchEnd) {
        self.scripts.borrow_mut().push_back(WatchScript {
            session_id: session_id.to_string(),
            events,
            end,
        });
    }

    pub fn set_helper_result(&self, result: Result<(), TransportError>) {
        *self.helper_result.borrow_mut() = result;
    }

    pub fn set_bindings(&self, bindings: Vec<Platform>) {
        *self.bindings.borrow_mut() = bindings;
    }

    /// Push `payload` on the newest open channel for `session_id`.
    pub fn send(&self, session_id: &str, payload: WatchPayload) -> bool {
        let index = self
            .opened
            .borrow()
            .iter()
            .rposition(|w| w.session_id == session_id);
        match index {
            Some(index) => self.send_on(index, session_id, payload),
            None => false,
        }
    }

    /// Push an event stamped with `session_id` on the `index`-th opened
    /// channel, whatever session that channel belongs to.
    pub fn send_on(&self, index: usize, session_id: &str, payload: WatchPayload) -> bool {
        self.deliver(
            index,
            Ok(WatchEvent {
                session_id: session_id.to_string(),
                payload,
            }),
        )
    }

    /// Break the newest channel for `session_id` with a transport error.
    pub fn fail(&self, session_id: &str, error: TransportError) -> bool {
        let index = self
            .opened
            .borrow()
            .iter()
            .rposition(|w| w.session_id == session_id);
        index.is_some_and(|index| self.deliver(index, Err(error)))
    }

    fn deliver(&self, index: usize, item: WatchItem) -> bool {
        self.opened
            .borrow()
            .get(index)
            .and_then(|w| w.sender.as_ref())
            .is_some_and(|sender| sender.send(item).is_ok())
    }

    pub fn close_counts(&self) -> Vec<usize> {
        self.opened.borrow().iter().map(|w| w.closes.get()).collect()
    }

    pub fn watch_count(&self) -> usize {
        self.opened.borrow().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn helper_requests(&self) -> Vec<HelperRequest> {
        self.helper_requests.borrow().clone()
    }

    pub fn cancelled_sessions(&self) -> Vec<String> {
        self.cancelled.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

#[async_trait(?Send)]
impl BindingTransport for ScriptedBindingTransport {
    async fn init_binding(
        &self,
        _platform: Platform,
        _credential: &Credential,
    ) -> Result<String, TransportError> {
        self.record("init".to_string());
        self.inits
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Status {
                status: 500,
                message: "no init scripted".to_string(),
            }))
    }

    async fn watch_binding(
        &self,
        session_id: &str,
    ) -> Result<Box<dyn BindingSubscription>, TransportError> {
        self.record(format!("watch:{}", session_id));

        let script = {
            let mut scripts = self.scripts.borrow_mut();
            let position = scripts.iter().position(|s| s.session_id == session_id);
            position.and_then(|p| scripts.remove(p))
        };
        let script = script.unwrap_or(WatchScript {
            session_id: session_id.to_string(),
            events: Vec::new(),
            end: WatchEnd::HoldOpen,
        });

        let (sender, receiver) = unbounded_channel();
        for payload in script.events {
            let _ = sender.send(Ok(WatchEvent {
                session_id: session_id.to_string(),
                payload,
            }));
        }
        let sender = match script.end {
            WatchEnd::Close => None,
            WatchEnd::HoldOpen => Some(sender),
        };

        let closes = Rc::new(Cell::new(0));
        self.opened.borrow_mut().push(OpenedWatch {
            session_id: session_id.to_string(),
            sender,
            closes: closes.clone(),
        });
        Ok(Box::new(ScriptedSubscription {
            session_id: session_id.to_string(),
            receiver: Some(receiver),
            closes,
        }))
    }

    async fn notify_helper(&self, request: &HelperRequest) -> Result<(), TransportError> {
        self.record("helper".to_string());
        self.helper_requests.borrow_mut().push(request.clone());
        self.helper_result.borrow().clone()
    }

    async fn cancel_binding(&self, session_id: &str) -> Result<(), TransportError> {
        self.record(format!("cancel:{}", session_id));
        self.cancelled.borrow_mut().push(session_id.to_string());
        Ok(())
    }

    async fn unbind(&self, platform: Platform, _credential: &Credential) -> Result<(), TransportError> {
        self.record(format!("unbind:{}", platform));
        self.bindings.borrow_mut().retain(|p| *p != platform);
        Ok(())
    }

    async fn list_bindings(&self, _credential: &Credential) -> Result<Vec<Platform>, TransportError> {
        self.record("bindings".to_string());
        Ok(self.bindings.borrow().clone())
    }
}

/// Migration transport that answers each request with a prepared body.
#[derive(Default)]
pub struct ScriptedMigrationTransport {
    responses: RefCell<VecDeque<Result<ByteStream, TransportError>>>,
    requests: RefCell<Vec<(String, bool)>>,
}

impl ScriptedMigrationTransport {
    /// Body that yields `chunks` as text and then ends.
    pub fn push_text(&self, chunks: &[&str]) {
        let chunks: Vec<&[u8]> = chunks.iter().map(|c| c.as_bytes()).collect();
        self.push_chunks(&chunks);
    }

    /// Body that yields `chunks` and then ends.
    pub fn push_chunks(&self, chunks: &[&[u8]]) {
        let items: Vec<Result<Bytes, TransportError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        self.push_body(Box::pin(stream::iter(items)));
    }

    /// Body fed by the test through the returned sender; ends when it drops.
    pub fn push_channel(&self) -> UnboundedSender<Result<Bytes, TransportError>> {
        let (sender, mut receiver) = unbounded_channel();
        let body = stream::poll_fn(move |cx| receiver.poll_recv(cx));
        self.push_body(Box::pin(body));
        sender
    }

    pub fn push_body(&self, body: ByteStream) {
        self.responses.borrow_mut().push_back(Ok(body));
    }

    pub fn push_error(&self, error: TransportError) {
        self.responses.borrow_mut().push_back(Err(error));
    }

    /// `(source_url, had_credential)` for each request made.
    pub fn requests(&self) -> Vec<(String, bool)> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl MigrationTransport for ScriptedMigrationTransport {
    async fn start_migration(
        &self,
        source_url: &str,
        credential: Option<&Credential>,
    ) -> Result<ByteStream, TransportError> {
        self.requests
            .borrow_mut()
            .push((source_url.to_string(), credential.is_some()));
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect {
                message: "no response scripted".to_string(),
            }))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    lines: RefCell<Vec<String>>,
    notices: RefCell<Vec<String>>,
    controls: RefCell<Vec<JobControls>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.borrow().clone()
    }

    pub fn controls(&self) -> Vec<JobControls> {
        self.controls.borrow().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn log_line(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }

    fn notify(&self, message: &str) {
        self.notices.borrow_mut().push(message.to_string());
    }

    fn controls_changed(&self, controls: &JobControls) {
        self.controls.borrow_mut().push(controls.clone());
    }
}

#[derive(Default)]
pub struct RecordingHost {
    confirm_answer: Cell<bool>,
    prompts: RefCell<Vec<String>>,
    reloads: Cell<usize>,
}

impl RecordingHost {
    pub fn answer_confirm(&self, answer: bool) {
        self.confirm_answer.set(answer);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn reloads(&self) -> usize {
        self.reloads.get()
    }
}

impl PageHost for RecordingHost {
    fn confirm(&self, message: &str) -> bool {
        self.prompts.borrow_mut().push(message.to_string());
        self.confirm_answer.get()
    }

    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }
}
