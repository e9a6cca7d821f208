mod support;

use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use tokio::task::LocalSet;
use transcript_core::ExtractorPhase;
use transcript_engine::{
    CaptionSelectors, DomCaptionExtractor, ExtractError, ExtractionMode, ExtractorSettings,
    LiveDocument, TranscriptExtractor,
};

use support::{counting_clock, init_logging, lines, settle, show_captions, tick, WATCH_URL};

fn extractor_for(document: &LiveDocument, settings: ExtractorSettings) -> DomCaptionExtractor {
    DomCaptionExtractor::new(
        "youtube.com",
        document.clone(),
        CaptionSelectors::youtube().unwrap(),
        settings,
    )
}

fn clocked() -> ExtractorSettings {
    ExtractorSettings {
        clock: counting_clock(),
        ..ExtractorSettings::default()
    }
}

#[tokio::test(start_paused = true)]
async fn stream_before_init_fails() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = LiveDocument::loaded_with(WATCH_URL, &support::player_page(&["a"])).unwrap();
            let mut extractor = extractor_for(&document, ExtractorSettings::default());

            let mut stream = extractor.observable().subscribe();
            assert_eq!(stream.next().await, Some(Err(ExtractError::Uninitialized)));
            assert_eq!(stream.next().await, None);
            assert_eq!(document.observer_count(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn consecutive_duplicates_are_suppressed() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = LiveDocument::loaded_with(WATCH_URL, &support::player_page(&["a"])).unwrap();
            let mut extractor = extractor_for(&document, clocked());
            extractor.on_init();

            let mut stream = extractor.observable().subscribe();
            let first = stream.next().await.unwrap().unwrap();
            assert_eq!(first.lines, lines(&["a"]));
            assert_eq!(first.time, tick(1));
            assert!(extractor.is_watching());

            show_captions(&document, &["a"]);
            show_captions(&document, &["b"]);

            let second = stream.next().await.unwrap().unwrap();
            assert_eq!(second.lines, lines(&["b"]));
            assert_eq!(second.time, tick(3));
            assert_eq!(extractor.captions().lines, lines(&["b"]));

            extractor.on_destroy();
            assert_eq!(stream.next().await, None);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn destroy_is_idempotent() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = LiveDocument::loaded_with(WATCH_URL, &support::player_page(&["a"])).unwrap();
            let mut extractor = extractor_for(&document, ExtractorSettings::default());
            extractor.on_init();

            let mut stream = extractor.observable().subscribe();
            stream.next().await.unwrap().unwrap();
            assert!(extractor.is_watching());
            assert_eq!(document.observer_count(), 1);

            extractor.on_destroy();
            assert_eq!(stream.next().await, None);
            let after_once = (extractor.is_watching(), extractor.phase(), document.observer_count());

            extractor.on_destroy();
            settle().await;
            let after_twice = (extractor.is_watching(), extractor.phase(), document.observer_count());

            assert_eq!(after_once, (false, ExtractorPhase::Destroyed, 0));
            assert_eq!(after_twice, after_once);
            assert!(extractor.captions().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn destroy_before_init_is_safe() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = LiveDocument::loaded_with(WATCH_URL, &support::player_page(&["a"])).unwrap();
            let mut extractor = extractor_for(&document, ExtractorSettings::default());

            extractor.on_destroy();
            assert_eq!(extractor.phase(), ExtractorPhase::Destroyed);
            assert!(!extractor.is_watching());

            let mut stream = extractor.observable().subscribe();
            assert_eq!(stream.next().await, None);
            assert_eq!(document.observer_count(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn mount_wait_times_out_without_emitting() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = LiveDocument::loaded_with(WATCH_URL, &support::bare_page()).unwrap();
            let settings = ExtractorSettings {
                mount_timeout: Duration::from_secs(5),
                ..ExtractorSettings::default()
            };
            let mut extractor = extractor_for(&document, settings);
            extractor.on_init();

            let started = tokio::time::Instant::now();
            let mut stream = extractor.observable().subscribe();
            match stream.next().await {
                Some(Err(ExtractError::MountTimeout { selector, timeout })) => {
                    assert_eq!(selector, "#ytp-caption-window-container");
                    assert_eq!(timeout, Duration::from_secs(5));
                }
                other => panic!("expected a mount timeout, got {other:?}"),
            }
            assert!(started.elapsed() >= Duration::from_secs(5));
            assert_eq!(stream.next().await, None);
            assert!(!extractor.is_watching());
            assert_eq!(document.observer_count(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn mount_wait_picks_up_late_container() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = LiveDocument::loaded_with(WATCH_URL, &support::bare_page()).unwrap();
            let mut extractor = extractor_for(&document, ExtractorSettings::default());
            extractor.on_init();
            assert!(extractor.captions().is_empty());

            let mount = document.clone();
            tokio::task::spawn_local(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                let player = mount.query("#movie_player").unwrap().unwrap();
                mount
                    .append_html(player, &support::caption_container(&[]))
                    .unwrap();
            });

            let mut stream = extractor.observable().subscribe();
            let first = stream.next().await.unwrap().unwrap();
            assert!(first.is_empty());
            assert!(extractor.is_watching());

            show_captions(&document, &["hello", "world"]);
            let next = stream.next().await.unwrap().unwrap();
            assert_eq!(next.lines, lines(&["hello", "world"]));

            extractor.on_destroy();
            assert_eq!(stream.next().await, None);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn captions_mounted_with_the_container_are_reported() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = LiveDocument::loaded_with(WATCH_URL, &support::bare_page()).unwrap();
            let mut extractor = extractor_for(&document, ExtractorSettings::default());
            extractor.on_init();

            let mount = document.clone();
            tokio::task::spawn_local(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let player = mount.query("#movie_player").unwrap().unwrap();
                mount
                    .append_html(player, &support::caption_container(&["hello"]))
                    .unwrap();
            });

            let mut stream = extractor.observable().subscribe();
            let first = stream.next().await.unwrap().unwrap();
            assert_eq!(first.lines, lines(&["hello"]));
            assert_eq!(extractor.captions().lines, lines(&["hello"]));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn subscribers_share_one_attachment() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = LiveDocument::loaded_with(WATCH_URL, &support::player_page(&["a"])).unwrap();
            let mut extractor = extractor_for(&document, ExtractorSettings::default());
            extractor.on_init();

            let mut first = extractor.observable().subscribe();
            let mut second = extractor.observable().subscribe();
            assert_eq!(first.next().await.unwrap().unwrap().lines, lines(&["a"]));
            assert_eq!(second.next().await.unwrap().unwrap().lines, lines(&["a"]));
            assert_eq!(document.observer_count(), 1);

            show_captions(&document, &["b"]);
            assert_eq!(first.next().await.unwrap().unwrap().lines, lines(&["b"]));
            assert_eq!(second.next().await.unwrap().unwrap().lines, lines(&["b"]));

            let mut late = extractor.observable().subscribe();
            assert_eq!(late.next().await.unwrap().unwrap().lines, lines(&["b"]));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn added_text_mode_reports_new_text_nodes_only() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = LiveDocument::loaded_with(WATCH_URL, &support::player_page(&["a"])).unwrap();
            let settings = ExtractorSettings {
                mode: ExtractionMode::AddedText,
                ..ExtractorSettings::default()
            };
            let mut extractor = extractor_for(&document, settings);
            extractor.on_init();

            let mut stream = extractor.observable().subscribe();
            assert_eq!(stream.next().await.unwrap().unwrap().lines, lines(&["a"]));

            let segment = document.query(".ytp-caption-segment").unwrap().unwrap();
            let line = document.query(".caption-visual-line").unwrap().unwrap();
            // Element insertions carry no text nodes of their own.
            document
                .append_html(line, r#"<span class="ytp-caption-segment">ignored</span>"#)
                .unwrap();
            document.set_text_content(segment, "  spoken words ").unwrap();

            let delta = stream.next().await.unwrap().unwrap();
            assert_eq!(delta.lines, lines(&["spoken words"]));
        })
        .await;
}
