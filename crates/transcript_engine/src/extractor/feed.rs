use std::cell::RefCell;
use std::rc::{Rc, Weak};

use engine_logging::engine_warn;
use futures_util::future::{self, LocalBoxFuture, Shared};
use futures_util::stream::{self, LocalBoxStream};
use futures_util::{FutureExt, Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use transcript_core::{CaptionDelta, DistinctLines};

use crate::error::ExtractError;

type AttachFuture = Shared<LocalBoxFuture<'static, Result<(), ExtractError>>>;

/// Subscription returned by [`DeltaFeed::subscribe`].
pub type DeltaStream = LocalBoxStream<'static, Result<CaptionDelta, ExtractError>>;

/// Last published delta plus fan-out to current subscribers.
pub(crate) struct LatestDelta {
    current: RefCell<CaptionDelta>,
    tx: broadcast::Sender<CaptionDelta>,
}

impl LatestDelta {
    pub(crate) fn new(initial: CaptionDelta, capacity: usize) -> Rc<Self> {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Rc::new(Self {
            current: RefCell::new(initial),
            tx,
        })
    }

    pub(crate) fn publish(&self, delta: CaptionDelta) {
        *self.current.borrow_mut() = delta.clone();
        let _ = self.tx.send(delta);
    }

    pub(crate) fn current(&self) -> CaptionDelta {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> (CaptionDelta, broadcast::Receiver<CaptionDelta>) {
        (self.current(), self.tx.subscribe())
    }
}

/// Hot, replaying stream of caption deltas for one extractor.
///
/// All subscriptions share a single lazy attach step, so the extractor
/// attaches to the document at most once. Each subscriber first receives the
/// latest delta, then every later one with consecutive duplicates removed.
#[derive(Clone)]
pub struct DeltaFeed {
    attach: AttachFuture,
    latest: Weak<LatestDelta>,
}

impl DeltaFeed {
    pub(crate) fn new(
        attach: LocalBoxFuture<'static, Result<(), ExtractError>>,
        latest: Weak<LatestDelta>,
    ) -> Self {
        Self {
            attach: attach.shared(),
            latest,
        }
    }

    /// A feed whose every subscription ends with `err`.
    pub fn failed(err: ExtractError) -> Self {
        Self::new(future::ready(Err(err)).boxed_local(), Weak::new())
    }

    /// Subscribes, attaching the extractor on first use.
    ///
    /// The stream ends quietly when the extractor is destroyed and yields a
    /// single error for any other failure.
    pub fn subscribe(&self) -> DeltaStream {
        let latest = self.latest.clone();
        stream::once(self.attach.clone())
            .flat_map(move |outcome| -> DeltaStream {
                match outcome {
                    Ok(()) => match latest.upgrade() {
                        Some(latest) => {
                            let (initial, rx) = latest.subscribe();
                            distinct_deltas(initial, rx).map(Ok).boxed_local()
                        }
                        None => stream::empty().boxed_local(),
                    },
                    Err(ExtractError::Detached) => stream::empty().boxed_local(),
                    Err(err) => stream::once(future::ready(Err(err))).boxed_local(),
                }
            })
            .boxed_local()
    }
}

fn distinct_deltas(
    initial: CaptionDelta,
    rx: broadcast::Receiver<CaptionDelta>,
) -> impl Stream<Item = CaptionDelta> {
    stream::unfold(
        (Some(initial), rx, DistinctLines::new()),
        |(mut pending, mut rx, mut filter)| async move {
            loop {
                let delta = match pending.take() {
                    Some(delta) => delta,
                    None => match rx.recv().await {
                        Ok(delta) => delta,
                        Err(RecvError::Lagged(skipped)) => {
                            engine_warn!("caption subscriber lagged, skipped {} deltas", skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => return None,
                    },
                };
                if filter.admit(&delta) {
                    return Some((delta, (None, rx, filter)));
                }
            }
        },
    )
}
