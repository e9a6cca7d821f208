use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio::sync::mpsc;
use transcript_core::{CaptionDelta, DistinctLines, Message, TranscriptResponse};

use crate::error::TransportError;
use crate::settings::ResponseMode;
use crate::strategy::{DeltaSink, Strategy};

/// Reply half of a request/response channel. May be invoked many times.
#[async_trait(?Send)]
pub trait Responder {
    async fn respond(&self, response: TranscriptResponse) -> Result<(), TransportError>;
}

/// Responder that forwards every response into a tokio channel.
#[derive(Clone)]
pub struct ChannelResponder {
    tx: mpsc::UnboundedSender<TranscriptResponse>,
}

impl ChannelResponder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TranscriptResponse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait(?Send)]
impl Responder for ChannelResponder {
    async fn respond(&self, response: TranscriptResponse) -> Result<(), TransportError> {
        self.tx.send(response).map_err(|_| TransportError::Closed)
    }
}

/// Accumulates deltas and re-sends the whole list after each one.
///
/// Every response carries the full history since the request was accepted,
/// so the cost of a response grows with the length of the session. Queued
/// responses share the history with the sink; a new delta copies it only
/// while an earlier response is still waiting for the pump.
///
/// Responses go through a single pump task so they reach the responder in
/// the order they were produced.
struct ResponderSink {
    observed: RefCell<Rc<Vec<CaptionDelta>>>,
    filter: RefCell<DistinctLines>,
    queue: mpsc::UnboundedSender<Rc<Vec<CaptionDelta>>>,
}

impl ResponderSink {
    /// Starts the pump and answers right away with `current`.
    fn spawn(responder: Rc<dyn Responder>, current: CaptionDelta) -> Rc<Self> {
        let (queue, mut rx) = mpsc::unbounded_channel::<Rc<Vec<CaptionDelta>>>();
        tokio::task::spawn_local(async move {
            while let Some(deltas) = rx.recv().await {
                let count = deltas.len();
                let response = TranscriptResponse::new(deltas.as_ref().clone());
                if let Err(err) = responder.respond(response).await {
                    engine_warn!("failed to deliver {} deltas: {}", count, err);
                }
            }
        });
        let sink = Rc::new(Self {
            observed: RefCell::new(Rc::new(Vec::new())),
            filter: RefCell::new(DistinctLines::new()),
            queue,
        });
        sink.emit(&current);
        sink
    }
}

impl DeltaSink for ResponderSink {
    fn emit(&self, delta: &CaptionDelta) {
        // The strategy replays the latest delta on subscription; it may be the
        // one this sink was seeded with.
        if !self.filter.borrow_mut().admit(delta) {
            return;
        }
        let deltas = {
            let mut observed = self.observed.borrow_mut();
            Rc::make_mut(&mut observed).push(delta.clone());
            observed.clone()
        };
        if self.queue.send(deltas).is_err() {
            engine_debug!("responder pump already stopped");
        }
    }
}

/// Dispatches inbound messages to the strategy.
pub struct MessageRouter {
    strategy: Rc<RefCell<Strategy>>,
    mode: ResponseMode,
}

impl MessageRouter {
    pub fn new(strategy: Rc<RefCell<Strategy>>, mode: ResponseMode) -> Self {
        Self { strategy, mode }
    }

    /// Handles one message. Returns whether a response will follow.
    ///
    /// Must be called from within a tokio `LocalSet`.
    pub fn accept(&self, message: Message, responder: Rc<dyn Responder>) -> bool {
        let url = match message {
            Message::GetTranscript { url } => url,
            Message::Unknown => {
                engine_debug!("ignoring unrecognized message");
                return false;
            }
        };

        let Ok(strategy) = self.strategy.try_borrow() else {
            engine_warn!("strategy busy; transcript request for {} dropped", url);
            return false;
        };
        if !strategy.resolver().supports(&url) {
            engine_info!("transcript requested for unsupported page {}", url);
            return false;
        }

        match self.mode {
            ResponseMode::Stream => {
                let current = strategy.captions();
                engine_info!("streaming transcript for {}, starting with {} lines", url, current.lines.len());
                strategy.set_sink(ResponderSink::spawn(responder, current));
            }
            ResponseMode::Snapshot => {
                let snapshot = strategy.captions();
                engine_info!("answering {} with {} caption lines", url, snapshot.lines.len());
                tokio::task::spawn_local(async move {
                    if let Err(err) = responder.respond(TranscriptResponse::new(vec![snapshot])).await {
                        engine_warn!("failed to deliver snapshot: {}", err);
                    }
                });
            }
        }
        true
    }
}
