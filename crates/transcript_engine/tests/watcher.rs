mod support;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::task::LocalSet;
use tokio::time::sleep;
use transcript_engine::{
    LiveDocument, NavigationError, Resolver, Strategy, Watcher, DEFAULT_DEBOUNCE_WINDOW,
};

use support::{init_logging, settle, Journal, RecordingExtractor, OTHER_URL, WATCH_URL};

struct Fixture {
    document: LiveDocument,
    journal: Journal,
    strategy: Rc<RefCell<Strategy>>,
    watcher: Watcher,
}

fn fixture(url: &str) -> Fixture {
    let document = LiveDocument::loaded_with(url, &support::bare_page()).unwrap();
    let journal: Journal = Rc::new(RefCell::new(Vec::new()));
    let resolver = Resolver::new().register("youtube.com", RecordingExtractor::factory("yt", &journal));
    let strategy = Rc::new(RefCell::new(Strategy::new(Rc::new(resolver), document.clone())));
    let watcher = Watcher::new(strategy.clone(), document.history().clone(), DEFAULT_DEBOUNCE_WINDOW);
    Fixture {
        document,
        journal,
        strategy,
        watcher,
    }
}

impl Fixture {
    fn journal(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    fn rebinds(&self) -> usize {
        self.journal
            .borrow()
            .iter()
            .filter(|entry| entry.starts_with("destroy:"))
            .count()
    }
}

#[tokio::test(start_paused = true)]
async fn watch_on_supported_page_initializes_and_hooks() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut f = fixture(WATCH_URL);
            let original_push = f.document.history().push_state_fn();
            let original_replace = f.document.history().replace_state_fn();

            assert!(f.watcher.watch());
            assert!(f.strategy.borrow().is_initialized());
            assert!(f.watcher.is_proxied());
            assert!(!Rc::ptr_eq(&f.document.history().push_state_fn(), &original_push));
            assert!(!Rc::ptr_eq(&f.document.history().replace_state_fn(), &original_replace));

            f.watcher.unwatch();
            assert!(!f.watcher.is_proxied());
            assert!(!f.strategy.borrow().is_active());
            assert!(Rc::ptr_eq(&f.document.history().push_state_fn(), &original_push));
            assert!(Rc::ptr_eq(&f.document.history().replace_state_fn(), &original_replace));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn watch_on_unsupported_page_leaves_hooks_uninstalled() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut f = fixture(OTHER_URL);
            let original_push = f.document.history().push_state_fn();

            assert!(!f.watcher.watch());
            assert!(!f.strategy.borrow().is_initialized());
            assert!(!f.watcher.is_proxied());
            assert!(Rc::ptr_eq(&f.document.history().push_state_fn(), &original_push));
            assert!(f.journal().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn second_watch_keeps_a_single_installation() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut f = fixture(WATCH_URL);
            let original_push = f.document.history().push_state_fn();

            assert!(f.watcher.watch());
            let hooked = f.document.history().push_state_fn();
            assert!(f.watcher.watch());
            assert!(Rc::ptr_eq(&f.document.history().push_state_fn(), &hooked));

            f.watcher.unwatch();
            assert!(Rc::ptr_eq(&f.document.history().push_state_fn(), &original_push));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn navigation_burst_rebinds_once_after_the_window() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut f = fixture(WATCH_URL);
            assert!(f.watcher.watch());
            assert_eq!(f.journal(), vec!["new:yt", "init:yt"]);

            let history = f.document.history().clone();
            history.push_state("/watch?v=1").unwrap();
            sleep(Duration::from_millis(10)).await;
            history.push_state("/watch?v=2").unwrap();
            sleep(Duration::from_millis(10)).await;
            history.replace_state("/watch?v=3").unwrap();

            // 49 ms after the last signal: still settling.
            sleep(Duration::from_millis(49)).await;
            assert_eq!(f.rebinds(), 0);

            sleep(Duration::from_millis(2)).await;
            assert_eq!(
                f.journal(),
                vec!["new:yt", "init:yt", "destroy:yt", "new:yt", "init:yt"]
            );
            assert_eq!(f.document.location(), "https://www.youtube.com/watch?v=3");

            sleep(Duration::from_millis(500)).await;
            assert_eq!(f.rebinds(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn rebind_follows_the_new_location() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut f = fixture(WATCH_URL);
            assert!(f.watcher.watch());

            f.document.history().push_state(OTHER_URL).unwrap();
            sleep(DEFAULT_DEBOUNCE_WINDOW * 2).await;
            assert!(!f.strategy.borrow().is_initialized());
            assert!(!f.strategy.borrow().is_active());
            assert!(f.watcher.is_proxied());

            f.document.history().push_state(WATCH_URL).unwrap();
            sleep(DEFAULT_DEBOUNCE_WINDOW * 2).await;
            assert!(f.strategy.borrow().is_initialized());
            assert_eq!(f.strategy.borrow().active_site(), Some("yt"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn popstate_and_hashchange_trigger_rebinds() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut f = fixture(WATCH_URL);
            assert!(f.watcher.watch());
            settle().await;

            f.document.history().set_hash("t=42");
            sleep(DEFAULT_DEBOUNCE_WINDOW * 2).await;
            assert_eq!(f.rebinds(), 1);

            assert!(f.document.history().back());
            sleep(DEFAULT_DEBOUNCE_WINDOW * 2).await;
            assert_eq!(f.rebinds(), 2);
            assert_eq!(f.document.location(), WATCH_URL);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn unwatch_cancels_a_pending_rebind() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut f = fixture(WATCH_URL);
            let history = f.document.history().clone();
            assert!(f.watcher.watch());

            history.push_state("/watch?v=9").unwrap();
            sleep(Duration::from_millis(10)).await;
            f.watcher.unwatch();
            sleep(DEFAULT_DEBOUNCE_WINDOW * 4).await;

            assert_eq!(f.journal(), vec!["new:yt", "init:yt", "destroy:yt"]);

            // Navigation after unwatch goes straight to the original entry point.
            history.push_state("/watch?v=10").unwrap();
            f.watcher.fire();
            sleep(DEFAULT_DEBOUNCE_WINDOW * 4).await;
            assert_eq!(f.rebinds(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn failed_navigation_keeps_hooks_installed() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut f = fixture(WATCH_URL);
            assert!(f.watcher.watch());

            let outcome = f.document.history().push_state("http://[broken");
            assert!(matches!(outcome, Err(NavigationError::InvalidUrl { .. })));
            assert!(f.watcher.is_proxied());
            assert_eq!(f.document.location(), WATCH_URL);

            sleep(DEFAULT_DEBOUNCE_WINDOW * 2).await;
            assert_eq!(f.rebinds(), 1);
            assert!(f.strategy.borrow().is_initialized());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn watch_again_after_unwatch_reinstalls() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut f = fixture(WATCH_URL);
            assert!(f.watcher.watch());
            f.watcher.unwatch();
            assert!(f.watcher.watch());
            assert!(f.watcher.is_proxied());

            f.document.history().push_state("/watch?v=5").unwrap();
            sleep(DEFAULT_DEBOUNCE_WINDOW * 2).await;
            assert_eq!(f.rebinds(), 2);
        })
        .await;
}
