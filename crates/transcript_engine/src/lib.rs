//! Transcript engine: watches a live document for caption changes, keeps the
//! active extractor bound across in-page navigation and answers transcript
//! requests.
//!
//! Everything here is single-threaded. Handles are `Rc` based and background
//! work is spawned with `tokio::task::spawn_local`, so callers drive the
//! engine from a tokio `LocalSet`.
mod controller;
mod debounce;
mod document;
mod engine;
mod error;
mod extractor;
mod history;
mod messaging;
mod resolver;
mod settings;
mod strategy;
mod watcher;

pub use ego_tree::NodeId;

pub use controller::{LocalMessenger, Tab, TabController, TabMessenger};
pub use debounce::{DebounceTrigger, Debouncer};
pub use document::{LiveDocument, MutationObserver, MutationRecord, ReadyState};
pub use engine::TranscriptEngine;
pub use error::{DocumentError, ExtractError, NavigationError, TransportError};
pub use extractor::{CaptionSelectors, DeltaFeed, DeltaStream, DomCaptionExtractor, TranscriptExtractor};
pub use history::{History, HistoryFn, NavigationEvent};
pub use messaging::{ChannelResponder, MessageRouter, Responder};
pub use resolver::{ExtractorFactory, Resolver};
pub use settings::{
    Clock, EngineSettings, ExtractionMode, ExtractorSettings, ResponseMode, DEFAULT_DEBOUNCE_WINDOW,
    DEFAULT_DELTA_CAPACITY, DEFAULT_MOUNT_TIMEOUT,
};
pub use strategy::{DeltaSink, Strategy};
pub use watcher::Watcher;
