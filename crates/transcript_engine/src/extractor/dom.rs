use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use ego_tree::NodeId;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::FutureExt;
use scraper::Selector;
use tokio_util::sync::CancellationToken;
use transcript_core::{advance, CaptionDelta, ExtractorPhase, LifecycleEvent};

use super::{DeltaFeed, LatestDelta, TranscriptExtractor};
use crate::document::{LiveDocument, MutationObserver, MutationRecord};
use crate::error::ExtractError;
use crate::settings::{ExtractionMode, ExtractorSettings};

const YOUTUBE_CONTAINER: &str = "#ytp-caption-window-container";
const YOUTUBE_CAPTION: &str = ".caption-visual-line > .ytp-caption-segment";

/// Selector pair locating a site's caption region and its text segments.
#[derive(Debug, Clone)]
pub struct CaptionSelectors {
    container_source: String,
    container: Selector,
    caption: Selector,
}

impl CaptionSelectors {
    pub fn parse(container: &str, caption: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            container_source: container.to_string(),
            container: parse_selector(container)?,
            caption: parse_selector(caption)?,
        })
    }

    /// Player caption window: one `.ytp-caption-segment` per visible line.
    pub fn youtube() -> Result<Self, ExtractError> {
        Self::parse(YOUTUBE_CONTAINER, YOUTUBE_CAPTION)
    }
}

fn parse_selector(source: &str) -> Result<Selector, ExtractError> {
    Selector::parse(source).map_err(|err| ExtractError::InvalidSelector {
        selector: source.to_string(),
        message: err.to_string(),
    })
}

/// Extractor for sites whose captions are rendered as DOM text.
pub struct DomCaptionExtractor {
    core: Rc<Core>,
}

struct Core {
    id: String,
    document: LiveDocument,
    selectors: CaptionSelectors,
    settings: ExtractorSettings,
    // Revokes the mount wait and the change-subscription together.
    cancel: CancellationToken,
    state: RefCell<State>,
}

#[derive(Default)]
struct State {
    phase: ExtractorPhase,
    container: Option<NodeId>,
    latest: Option<Rc<LatestDelta>>,
    feed: Option<DeltaFeed>,
}

impl DomCaptionExtractor {
    pub fn new(
        id: impl Into<String>,
        document: LiveDocument,
        selectors: CaptionSelectors,
        settings: ExtractorSettings,
    ) -> Self {
        Self {
            core: Rc::new(Core {
                id: id.into(),
                document,
                selectors,
                settings,
                cancel: CancellationToken::new(),
                state: RefCell::new(State::default()),
            }),
        }
    }

    pub fn phase(&self) -> ExtractorPhase {
        self.core.state.borrow().phase
    }
}

impl Core {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        (self.settings.clock)()
    }

    /// Cached container, dropping the cache once the node leaves the document.
    fn container(&self, state: &mut State) -> Option<NodeId> {
        if let Some(container) = state.container {
            if self.document.is_attached(container) {
                return Some(container);
            }
            state.container = None;
        }
        state.container = self.document.query_selector(&self.selectors.container);
        state.container
    }

    fn snapshot(&self, container: Option<NodeId>) -> CaptionDelta {
        match container {
            Some(container) => CaptionDelta::from_texts(
                self.now(),
                self.document
                    .select_texts(container, &self.selectors.caption),
            ),
            None => CaptionDelta::empty(self.now()),
        }
    }

    /// Delta for one batch of change records, if the batch yields one.
    fn derive(&self, container: NodeId, records: &[MutationRecord]) -> Option<CaptionDelta> {
        match self.settings.mode {
            ExtractionMode::Snapshot => Some(self.snapshot(Some(container))),
            ExtractionMode::AddedText => {
                let record = records.last()?;
                let texts: Vec<String> = record
                    .added_nodes
                    .iter()
                    .filter_map(|node| self.document.text_node_content(*node))
                    .collect();
                let delta = CaptionDelta::from_texts(self.now(), texts);
                if delta.is_empty() {
                    None
                } else {
                    Some(delta)
                }
            }
        }
    }

    fn transition(&self, state: &mut State, event: LifecycleEvent) -> bool {
        match advance(state.phase, event) {
            Ok(next) => {
                state.phase = next;
                true
            }
            Err(err) => {
                engine_warn!("[{}] {}", self.id, err);
                false
            }
        }
    }
}

impl TranscriptExtractor for DomCaptionExtractor {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn on_init(&mut self) -> &mut dyn TranscriptExtractor {
        {
            let core = &self.core;
            let mut state = core.state.borrow_mut();
            if core.transition(&mut state, LifecycleEvent::Init) {
                let container = core.container(&mut state);
                let initial = core.snapshot(container);
                state.latest = Some(LatestDelta::new(initial, core.settings.delta_capacity));
                state.feed = None;
                engine_info!(
                    "[{}] initialized, caption container {}",
                    core.id,
                    if container.is_some() { "present" } else { "pending" }
                );
            }
        }
        self
    }

    fn on_destroy(&mut self) {
        let core = &self.core;
        core.cancel.cancel();
        let mut state = core.state.borrow_mut();
        let was_destroyed = state.phase == ExtractorPhase::Destroyed;
        state.latest = None;
        state.feed = None;
        state.container = None;
        core.transition(&mut state, LifecycleEvent::Destroy);
        if !was_destroyed {
            engine_info!("[{}] stopped watching captions", core.id);
        }
    }

    fn observable(&mut self) -> DeltaFeed {
        let mut state = self.core.state.borrow_mut();
        match state.phase {
            ExtractorPhase::Unattached => return DeltaFeed::failed(ExtractError::Uninitialized),
            ExtractorPhase::Destroyed => return DeltaFeed::failed(ExtractError::Detached),
            ExtractorPhase::Initialized | ExtractorPhase::Watching => {}
        }
        if let Some(feed) = &state.feed {
            return feed.clone();
        }
        let Some(latest) = state.latest.as_ref().map(Rc::downgrade) else {
            return DeltaFeed::failed(ExtractError::Uninitialized);
        };
        let feed = DeltaFeed::new(attach(Rc::downgrade(&self.core)).boxed_local(), latest);
        state.feed = Some(feed.clone());
        feed
    }

    fn captions(&self) -> CaptionDelta {
        let state = self.core.state.borrow();
        match &state.latest {
            Some(latest) => latest.current(),
            None => CaptionDelta::empty(self.core.now()),
        }
    }

    fn is_watching(&self) -> bool {
        self.core.state.borrow().phase == ExtractorPhase::Watching
    }
}

/// Locates the container (waiting for it if needed) and starts observing it.
async fn attach(core: Weak<Core>) -> Result<(), ExtractError> {
    let (document, container_selector, container_source, timeout, cancel, existing) = {
        let core = core.upgrade().ok_or(ExtractError::Detached)?;
        let mut state = core.state.borrow_mut();
        if state.phase == ExtractorPhase::Destroyed {
            return Err(ExtractError::Detached);
        }
        let existing = core.container(&mut state);
        (
            core.document.clone(),
            core.selectors.container.clone(),
            core.selectors.container_source.clone(),
            core.settings.mount_timeout,
            core.cancel.clone(),
            existing,
        )
    };

    let container = match existing {
        Some(container) => container,
        None => {
            engine_debug!("waiting for caption container {}", container_source);
            wait_for_mount(
                &document,
                &container_selector,
                &container_source,
                timeout,
                &cancel,
            )
            .await?
        }
    };

    let core = core.upgrade().ok_or(ExtractError::Detached)?;
    let latest = {
        let mut state = core.state.borrow_mut();
        if state.phase == ExtractorPhase::Destroyed {
            return Err(ExtractError::Detached);
        }
        let latest = state.latest.clone().ok_or(ExtractError::Uninitialized)?;
        state.container = Some(container);
        if !core.transition(&mut state, LifecycleEvent::Attached) {
            return Err(ExtractError::Uninitialized);
        }
        latest
    };

    let observer = document.observe(container);
    if core.settings.mode == ExtractionMode::Snapshot {
        refresh(&core, container, &latest);
    }
    engine_info!("[{}] watching captions", core.id);
    tokio::task::spawn_local(observe_captions(core, observer, latest));
    Ok(())
}

/// Catches up with captions that changed between `on_init` and attaching:
/// text already inside a freshly mounted container, or lines replaced while
/// the document was still loading.
fn refresh(core: &Core, container: NodeId, latest: &LatestDelta) {
    let current = latest.current();
    let visible = CaptionDelta::from_texts(
        current.time,
        core.document.select_texts(container, &core.selectors.caption),
    );
    if visible != current {
        engine_debug!("[{}] captions changed before attaching", core.id);
        latest.publish(CaptionDelta::new(core.now(), visible.lines));
    }
}

async fn wait_for_mount(
    document: &LiveDocument,
    selector: &Selector,
    selector_source: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<NodeId, ExtractError> {
    let mut observer = document.observe(document.root());
    let scan = async {
        while let Some(batch) = observer.next_batch().await {
            let found = batch
                .iter()
                .flat_map(|record| record.added_nodes.iter())
                .find_map(|node| document.matches_or_contains(*node, selector));
            if found.is_some() {
                return found;
            }
        }
        None
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(ExtractError::Detached),
        outcome = tokio::time::timeout(timeout, scan) => match outcome {
            Ok(Some(found)) => Ok(found),
            Ok(None) => Err(ExtractError::Detached),
            Err(_) => {
                engine_warn!("caption container {} not found after {:?}", selector_source, timeout);
                Err(ExtractError::MountTimeout {
                    selector: selector_source.to_string(),
                    timeout,
                })
            }
        },
    }
}

async fn observe_captions(core: Rc<Core>, mut observer: MutationObserver, latest: Rc<LatestDelta>) {
    let container = observer.target();
    let cancel = core.cancel.clone();
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = observer.next_batch() => batch,
        };
        let Some(records) = batch else {
            break;
        };
        if let Some(delta) = core.derive(container, &records) {
            latest.publish(delta);
        }
    }
    engine_debug!("[{}] caption observer released", core.id);
}
