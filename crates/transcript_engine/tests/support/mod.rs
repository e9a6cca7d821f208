#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use transcript_core::CaptionDelta;
use transcript_engine::{
    Clock, DeltaFeed, DeltaSink, ExtractError, ExtractorFactory, LiveDocument, TranscriptExtractor,
};

pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=abc123";
pub const OTHER_URL: &str = "https://example.com/article";

pub fn init_logging() {
    engine_logging::initialize_for_tests();
}

/// Caption lines as the player renders them.
pub fn caption_lines(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| {
            format!(
                r#"<span class="caption-visual-line"><span class="ytp-caption-segment">{line}</span></span>"#
            )
        })
        .collect()
}

pub fn caption_container(lines: &[&str]) -> String {
    format!(
        r#"<div id="ytp-caption-window-container"><div class="caption-window">{}</div></div>"#,
        caption_lines(lines)
    )
}

pub fn player_page(lines: &[&str]) -> String {
    format!(
        r#"<html><body><div id="movie_player">{}</div></body></html>"#,
        caption_container(lines)
    )
}

pub fn bare_page() -> String {
    r#"<html><body><div id="movie_player"></div></body></html>"#.to_string()
}

/// Replaces the visible caption lines of a page built by [`player_page`].
pub fn show_captions(document: &LiveDocument, lines: &[&str]) {
    let window = document
        .query(".caption-window")
        .unwrap()
        .expect("caption window present");
    document.set_inner_html(window, &caption_lines(lines)).unwrap();
}

pub fn tick(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(n)
}

/// Clock returning `tick(1)`, `tick(2)`, ... on successive calls.
pub fn counting_clock() -> Clock {
    let calls = Rc::new(Cell::new(0));
    Rc::new(move || {
        calls.set(calls.get() + 1);
        tick(calls.get())
    })
}

pub type Journal = Rc<RefCell<Vec<String>>>;

/// Extractor that only records its lifecycle calls.
pub struct RecordingExtractor {
    id: String,
    journal: Journal,
}

impl RecordingExtractor {
    pub fn factory(id: &str, journal: &Journal) -> ExtractorFactory {
        let id = id.to_string();
        let journal = journal.clone();
        Rc::new(move || {
            journal.borrow_mut().push(format!("new:{id}"));
            Box::new(RecordingExtractor {
                id: id.clone(),
                journal: journal.clone(),
            }) as Box<dyn TranscriptExtractor>
        })
    }
}

impl TranscriptExtractor for RecordingExtractor {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_init(&mut self) -> &mut dyn TranscriptExtractor {
        self.journal.borrow_mut().push(format!("init:{}", self.id));
        self
    }

    fn on_destroy(&mut self) {
        self.journal.borrow_mut().push(format!("destroy:{}", self.id));
    }

    fn observable(&mut self) -> DeltaFeed {
        DeltaFeed::failed(ExtractError::Detached)
    }

    fn captions(&self) -> CaptionDelta {
        CaptionDelta::empty(tick(0))
    }

    fn is_watching(&self) -> bool {
        false
    }
}

/// Sink collecting everything it receives.
#[derive(Default)]
pub struct CollectingSink {
    deltas: RefCell<Vec<CaptionDelta>>,
}

impl CollectingSink {
    pub fn lines(&self) -> Vec<Vec<String>> {
        self.deltas
            .borrow()
            .iter()
            .map(|delta| delta.lines.clone())
            .collect()
    }
}

impl DeltaSink for CollectingSink {
    fn emit(&self, delta: &CaptionDelta) {
        self.deltas.borrow_mut().push(delta.clone());
    }
}

/// Lets spawned local tasks run until they block. With a paused clock the
/// sleep only completes once nothing else is runnable.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
}

pub fn lines(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
