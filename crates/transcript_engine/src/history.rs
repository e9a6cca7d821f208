use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::broadcast;
use url::Url;

use crate::error::NavigationError;

/// A replaceable history entry point. Receives the target URL, which may be
/// relative to the current location.
pub type HistoryFn = Rc<dyn Fn(&str) -> Result<(), NavigationError>>;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    /// Back/forward traversal landed on `url`.
    PopState { url: String },
    /// Only the fragment changed.
    HashChange { old_url: String, new_url: String },
}

/// Session history of a [`crate::LiveDocument`].
///
/// `push_state` and `replace_state` dispatch through slots that callers may
/// swap out, which is how navigation is made observable.
#[derive(Clone)]
pub struct History {
    inner: Rc<HistoryInner>,
}

struct HistoryInner {
    session: Rc<RefCell<Session>>,
    push_state: RefCell<HistoryFn>,
    replace_state: RefCell<HistoryFn>,
    events: broadcast::Sender<NavigationEvent>,
}

struct Session {
    location: Url,
    back_stack: Vec<Url>,
}

impl Session {
    fn resolve(&self, target: &str) -> Result<Url, NavigationError> {
        self.location
            .join(target)
            .map_err(|err| NavigationError::InvalidUrl {
                url: target.to_string(),
                reason: err.to_string(),
            })
    }
}

impl History {
    pub fn new(url: &str) -> Result<Self, NavigationError> {
        let location = Url::parse(url).map_err(|err| NavigationError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        let session = Rc::new(RefCell::new(Session {
            location,
            back_stack: Vec::new(),
        }));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            inner: Rc::new(HistoryInner {
                push_state: RefCell::new(default_push(session.clone())),
                replace_state: RefCell::new(default_replace(session.clone())),
                session,
                events,
            }),
        })
    }

    pub fn location(&self) -> String {
        self.inner.session.borrow().location.to_string()
    }

    pub fn push_state(&self, url: &str) -> Result<(), NavigationError> {
        let entry = self.inner.push_state.borrow().clone();
        entry(url)
    }

    pub fn replace_state(&self, url: &str) -> Result<(), NavigationError> {
        let entry = self.inner.replace_state.borrow().clone();
        entry(url)
    }

    pub fn push_state_fn(&self) -> HistoryFn {
        self.inner.push_state.borrow().clone()
    }

    pub fn replace_state_fn(&self) -> HistoryFn {
        self.inner.replace_state.borrow().clone()
    }

    /// Installs a new `push_state` entry point and returns the previous one.
    pub fn set_push_state_fn(&self, entry: HistoryFn) -> HistoryFn {
        self.inner.push_state.replace(entry)
    }

    /// Installs a new `replace_state` entry point and returns the previous one.
    pub fn set_replace_state_fn(&self, entry: HistoryFn) -> HistoryFn {
        self.inner.replace_state.replace(entry)
    }

    /// Steps back one entry and broadcasts [`NavigationEvent::PopState`].
    /// Returns false when there is nothing to go back to.
    pub fn back(&self) -> bool {
        let url = {
            let mut session = self.inner.session.borrow_mut();
            let Some(previous) = session.back_stack.pop() else {
                return false;
            };
            session.location = previous;
            session.location.to_string()
        };
        let _ = self.inner.events.send(NavigationEvent::PopState { url });
        true
    }

    /// Rewrites the fragment and broadcasts [`NavigationEvent::HashChange`].
    pub fn set_hash(&self, fragment: &str) {
        let (old_url, new_url) = {
            let mut session = self.inner.session.borrow_mut();
            let mut next = session.location.clone();
            next.set_fragment(Some(fragment.trim_start_matches('#')));
            if next == session.location {
                return;
            }
            let previous = std::mem::replace(&mut session.location, next);
            let old_url = previous.to_string();
            session.back_stack.push(previous);
            (old_url, session.location.to_string())
        };
        let _ = self
            .inner
            .events
            .send(NavigationEvent::HashChange { old_url, new_url });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.inner.events.subscribe()
    }
}

fn default_push(session: Rc<RefCell<Session>>) -> HistoryFn {
    Rc::new(move |target: &str| {
        let mut session = session.borrow_mut();
        let next = session.resolve(target)?;
        let previous = std::mem::replace(&mut session.location, next);
        session.back_stack.push(previous);
        Ok(())
    })
}

fn default_replace(session: Rc<RefCell<Session>>) -> HistoryFn {
    Rc::new(move |target: &str| {
        let mut session = session.borrow_mut();
        let next = session.resolve(target)?;
        session.location = next;
        Ok(())
    })
}
