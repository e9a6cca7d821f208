use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::debounce::{DebounceTrigger, Debouncer};
use crate::history::{History, HistoryFn, NavigationEvent};
use crate::strategy::Strategy;

/// Keeps a [`Strategy`] bound to the document's current location across
/// in-page navigation.
pub struct Watcher {
    strategy: Rc<RefCell<Strategy>>,
    history: History,
    debounce_window: Duration,
    installation: Option<Installation>,
}

/// Everything `unwatch` has to undo.
struct Installation {
    original_push: HistoryFn,
    original_replace: HistoryFn,
    // Revokes the debounce task and the navigation listener together.
    aborter: CancellationToken,
    debouncer: Debouncer,
}

impl Watcher {
    pub fn new(strategy: Rc<RefCell<Strategy>>, history: History, debounce_window: Duration) -> Self {
        Self {
            strategy,
            history,
            debounce_window,
            installation: None,
        }
    }

    pub fn strategy(&self) -> &Rc<RefCell<Strategy>> {
        &self.strategy
    }

    /// Binds the strategy and, when a site matched, hooks navigation.
    ///
    /// Must be called from within a tokio `LocalSet`.
    pub fn watch(&mut self) -> bool {
        let listening = match self.strategy.try_borrow_mut() {
            Ok(mut strategy) => strategy.listen(),
            Err(_) => {
                engine_warn!("strategy busy; watch skipped");
                false
            }
        };
        if listening {
            self.proxy();
        } else {
            engine_debug!("nothing to extract at {}; navigation hooks not installed", self.history.location());
        }
        listening
    }

    /// Tears the strategy down and restores the original navigation entry points.
    pub fn unwatch(&mut self) {
        match self.strategy.try_borrow_mut() {
            Ok(mut strategy) => strategy.destroy(),
            Err(_) => engine_warn!("strategy busy during unwatch; extractor left to its owner"),
        }
        self.unproxy();
    }

    /// Requests a debounced rebind. Ignored while navigation is not hooked.
    pub fn fire(&self) {
        match &self.installation {
            Some(installation) => installation.debouncer.fire(),
            None => engine_debug!("fire ignored; watcher not installed"),
        }
    }

    pub fn is_proxied(&self) -> bool {
        self.installation.is_some()
    }

    fn proxy(&mut self) {
        if self.installation.is_some() {
            return;
        }

        let aborter = CancellationToken::new();
        let strategy = Rc::downgrade(&self.strategy);
        let debouncer = Debouncer::spawn(self.debounce_window, aborter.clone(), move || {
            if let Some(strategy) = strategy.upgrade() {
                rebind(&strategy);
            }
        });

        let original_push = self.history.push_state_fn();
        let original_replace = self.history.replace_state_fn();
        self.history
            .set_push_state_fn(hooked("pushState", original_push.clone(), debouncer.trigger()));
        self.history
            .set_replace_state_fn(hooked("replaceState", original_replace.clone(), debouncer.trigger()));

        tokio::task::spawn_local(listen_for_navigation(
            self.history.subscribe(),
            aborter.clone(),
            debouncer.trigger(),
        ));

        self.installation = Some(Installation {
            original_push,
            original_replace,
            aborter,
            debouncer,
        });
        engine_info!("navigation hooks installed");
    }

    fn unproxy(&mut self) {
        let Some(installation) = self.installation.take() else {
            return;
        };
        self.history.set_push_state_fn(installation.original_push);
        self.history.set_replace_state_fn(installation.original_replace);
        installation.aborter.cancel();
        engine_info!("navigation hooks removed");
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.unproxy();
    }
}

/// Settled navigation: tear down the old binding, then bind the new location.
fn rebind(strategy: &RefCell<Strategy>) {
    let Ok(mut strategy) = strategy.try_borrow_mut() else {
        engine_warn!("strategy busy; rebind skipped");
        return;
    };
    strategy.destroy();
    let bound = strategy.listen();
    engine_debug!("rebind finished, extractor bound: {}", bound);
}

/// Wraps `original` so every call also signals the debouncer. The original
/// result is passed through untouched.
fn hooked(name: &'static str, original: HistoryFn, trigger: DebounceTrigger) -> HistoryFn {
    Rc::new(move |url: &str| {
        let outcome = original(url);
        if let Err(err) = &outcome {
            engine_warn!("{} to {} failed: {}", name, url, err);
        }
        trigger.fire();
        outcome
    })
}

async fn listen_for_navigation(
    mut events: broadcast::Receiver<NavigationEvent>,
    cancel: CancellationToken,
    trigger: DebounceTrigger,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(NavigationEvent::PopState { url }) => {
                engine_debug!("popstate to {}", url);
                trigger.fire();
            }
            Ok(NavigationEvent::HashChange { new_url, .. }) => {
                engine_debug!("hashchange to {}", new_url);
                trigger.fire();
            }
            Err(RecvError::Lagged(skipped)) => {
                engine_debug!("navigation listener lagged by {} events", skipped);
                trigger.fire();
            }
            Err(RecvError::Closed) => break,
        }
    }
}
