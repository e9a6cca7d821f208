use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use transcript_core::CaptionDelta;

use crate::document::{LiveDocument, ReadyState};
use crate::error::ExtractError;
use crate::extractor::{DeltaFeed, TranscriptExtractor};
use crate::resolver::Resolver;

/// Receives every delta the active extractor produces.
pub trait DeltaSink {
    fn emit(&self, delta: &CaptionDelta);
}

type SinkSlot = Rc<RefCell<Option<Rc<dyn DeltaSink>>>>;

/// Binds one extractor at a time to the document's current locator, logs
/// every delta it produces and forwards them to the consumer sink, if any.
///
/// The strategy is the only owner of the active extractor and the only one
/// allowed to destroy it.
pub struct Strategy {
    resolver: Rc<Resolver>,
    document: LiveDocument,
    active: Option<Box<dyn TranscriptExtractor>>,
    subscription: Option<CancellationToken>,
    initialized: bool,
    sink: SinkSlot,
}

impl Strategy {
    pub fn new(resolver: Rc<Resolver>, document: LiveDocument) -> Self {
        Self {
            resolver,
            document,
            active: None,
            subscription: None,
            initialized: false,
            sink: Rc::new(RefCell::new(None)),
        }
    }

    /// Resolves the current locator and, on success, initializes the new
    /// extractor and subscribes to it once the document has loaded.
    ///
    /// Must be called from within a tokio `LocalSet`.
    pub fn listen(&mut self) -> bool {
        if self.active.is_some() || self.subscription.is_some() {
            engine_debug!("listen called with an active extractor; tearing it down first");
            self.destroy();
        }

        let locator = self.document.location();
        let Some(mut extractor) = self.resolver.resolve(&locator) else {
            engine_info!("no caption extractor for {}", locator);
            self.initialized = false;
            return false;
        };

        extractor.on_init();
        let feed = extractor.observable();
        let id = extractor.id().to_string();
        engine_info!("[{}] bound to {}", id, locator);

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let document = self.document.clone();
        let sink = self.sink.clone();
        tokio::task::spawn_local(async move {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = forward(id, document, feed, sink) => {}
            }
        });

        self.active = Some(extractor);
        self.subscription = Some(cancel);
        self.initialized = true;
        true
    }

    /// Unsubscribes and destroys the active extractor. No-op when idle.
    pub fn destroy(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(mut extractor) = self.active.take() {
            extractor.on_destroy();
        }
    }

    /// Whether the most recent `listen` bound an extractor.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_site(&self) -> Option<&str> {
        self.active.as_ref().map(|extractor| extractor.id())
    }

    pub fn is_watching(&self) -> bool {
        self.active
            .as_ref()
            .map(|extractor| extractor.is_watching())
            .unwrap_or(false)
    }

    /// Current snapshot of the active extractor, or an empty delta.
    pub fn captions(&self) -> CaptionDelta {
        match &self.active {
            Some(extractor) => extractor.captions(),
            None => CaptionDelta::empty(Utc::now()),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Routes deltas to `sink` from now on, including for the active stream.
    pub fn set_sink(&self, sink: Rc<dyn DeltaSink>) {
        *self.sink.borrow_mut() = Some(sink);
    }

    pub fn clear_sink(&self) {
        self.sink.borrow_mut().take();
    }

    pub fn has_sink(&self) -> bool {
        self.sink.borrow().is_some()
    }
}

impl Drop for Strategy {
    fn drop(&mut self) {
        self.destroy();
    }
}

async fn forward(id: String, document: LiveDocument, feed: DeltaFeed, sink: SinkSlot) {
    if document.ready_state() == ReadyState::Loading {
        engine_debug!("[{}] document still loading; subscription deferred", id);
        document.loaded().await;
    }
    let mut deltas = feed.subscribe();
    while let Some(item) = deltas.next().await {
        match item {
            Ok(delta) => {
                engine_info!("[{}] captions @ {}: {:?}", id, delta.time.to_rfc3339(), delta.lines);
                let consumer = sink.borrow().clone();
                if let Some(consumer) = consumer {
                    consumer.emit(&delta);
                }
            }
            Err(err) => {
                report(&id, &err);
                break;
            }
        }
    }
    engine_debug!("[{}] caption stream completed", id);
}

fn report(id: &str, err: &ExtractError) {
    match err {
        ExtractError::Detached => engine_debug!("[{}] {}", id, err),
        _ => engine_warn!("[{}] caption stream failed: {}", id, err),
    }
}
