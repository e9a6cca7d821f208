use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ego_tree::{NodeId, NodeMut, NodeRef};
use scraper::node::{Node, Text};
use scraper::{ElementRef, Html, Selector};
use tokio::sync::{mpsc, watch};

use crate::error::{DocumentError, NavigationError};
use crate::history::History;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Complete,
}

/// One structural change: `target` gained `added_nodes` and lost `removed_nodes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
}

/// A live, externally mutated HTML document.
///
/// Cheap to clone; every clone refers to the same tree. The handle is
/// single-threaded and meant to be driven from a tokio `LocalSet`.
#[derive(Clone)]
pub struct LiveDocument {
    inner: Rc<DocumentInner>,
}

struct DocumentInner {
    html: RefCell<Html>,
    history: History,
    ready: watch::Sender<ReadyState>,
    observers: RefCell<Vec<Registration>>,
    next_observer: Cell<u64>,
}

struct Registration {
    id: u64,
    target: NodeId,
    tx: mpsc::UnboundedSender<Vec<MutationRecord>>,
}

impl LiveDocument {
    /// Parses `html` as a document served from `url`. The document starts in
    /// [`ReadyState::Loading`].
    pub fn new(url: &str, html: &str) -> Result<Self, NavigationError> {
        let history = History::new(url)?;
        let (ready, _) = watch::channel(ReadyState::Loading);
        Ok(Self {
            inner: Rc::new(DocumentInner {
                html: RefCell::new(Html::parse_document(html)),
                history,
                ready,
                observers: RefCell::new(Vec::new()),
                next_observer: Cell::new(1),
            }),
        })
    }

    /// Same as [`LiveDocument::new`] but already past initial loading.
    pub fn loaded_with(url: &str, html: &str) -> Result<Self, NavigationError> {
        let document = Self::new(url, html)?;
        document.finish_loading();
        Ok(document)
    }

    pub fn location(&self) -> String {
        self.inner.history.location()
    }

    pub fn history(&self) -> &History {
        &self.inner.history
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.inner.ready.borrow()
    }

    pub fn finish_loading(&self) {
        self.inner.ready.send_replace(ReadyState::Complete);
    }

    /// Resolves once initial loading has finished.
    pub async fn loaded(&self) {
        let mut ready = self.inner.ready.subscribe();
        let _ = ready.wait_for(|state| *state == ReadyState::Complete).await;
    }

    pub fn root(&self) -> NodeId {
        self.inner.html.borrow().tree.root().id()
    }

    /// First attached element matching `selector`, in document order.
    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        let html = self.inner.html.borrow();
        let found = matching(html.tree.root(), selector).next().map(|el| el.id());
        found
    }

    /// Parses `selector` and runs [`LiveDocument::query_selector`].
    pub fn query(&self, selector: &str) -> Result<Option<NodeId>, DocumentError> {
        let parsed = Selector::parse(selector).map_err(|err| DocumentError::InvalidSelector {
            selector: selector.to_string(),
            message: err.to_string(),
        })?;
        Ok(self.query_selector(&parsed))
    }

    /// Text of every element under `root` (inclusive) matching `selector`.
    pub fn select_texts(&self, root: NodeId, selector: &Selector) -> Vec<String> {
        let html = self.inner.html.borrow();
        let Some(node) = html.tree.get(root) else {
            return Vec::new();
        };
        let texts = matching(node, selector)
            .map(|el| el.text().collect::<String>())
            .collect();
        texts
    }

    /// `node` itself when it matches, else its first matching descendant.
    pub fn matches_or_contains(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let html = self.inner.html.borrow();
        let start = html.tree.get(node)?;
        let found = matching(start, selector).next().map(|el| el.id());
        found
    }

    /// Content of a text node; `None` for every other node kind.
    pub fn text_node_content(&self, node: NodeId) -> Option<String> {
        let html = self.inner.html.borrow();
        let text = match html.tree.get(node)?.value() {
            Node::Text(text) => Some(String::from(&**text)),
            _ => None,
        };
        text
    }

    /// Whether `node` is reachable from the document root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let html = self.inner.html.borrow();
        let root = html.tree.root().id();
        is_inclusive_ancestor(&html, root, node)
    }

    pub fn append_html(&self, parent: NodeId, fragment: &str) -> Result<Vec<NodeId>, DocumentError> {
        let added = {
            let mut html = self.inner.html.borrow_mut();
            graft(&mut html, parent, fragment)?
        };
        self.dispatch(vec![MutationRecord {
            target: parent,
            added_nodes: added.clone(),
            removed_nodes: Vec::new(),
        }]);
        Ok(added)
    }

    pub fn set_inner_html(&self, node: NodeId, fragment: &str) -> Result<Vec<NodeId>, DocumentError> {
        let (removed, added) = {
            let mut html = self.inner.html.borrow_mut();
            let removed = detach_children(&mut html, node)?;
            let added = graft(&mut html, node, fragment)?;
            (removed, added)
        };
        self.dispatch(vec![MutationRecord {
            target: node,
            added_nodes: added.clone(),
            removed_nodes: removed,
        }]);
        Ok(added)
    }

    /// Replaces the children of `node` with a single text node holding
    /// `text` verbatim. An empty `text` just clears the children.
    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<Vec<NodeId>, DocumentError> {
        let (removed, added) = {
            let mut html = self.inner.html.borrow_mut();
            let removed = detach_children(&mut html, node)?;
            let mut added = Vec::new();
            if !text.is_empty() {
                let mut target = html.tree.get_mut(node).ok_or(DocumentError::UnknownNode(node))?;
                let content = Text { text: text.into() };
                added.push(target.append(Node::Text(content)).id());
            }
            (removed, added)
        };
        self.dispatch(vec![MutationRecord {
            target: node,
            added_nodes: added.clone(),
            removed_nodes: removed,
        }]);
        Ok(added)
    }

    pub fn remove(&self, node: NodeId) -> Result<(), DocumentError> {
        let parent = {
            let mut html = self.inner.html.borrow_mut();
            let parent = html
                .tree
                .get(node)
                .and_then(|n| n.parent())
                .map(|p| p.id())
                .ok_or(DocumentError::UnknownNode(node))?;
            if let Some(mut target) = html.tree.get_mut(node) {
                target.detach();
            }
            parent
        };
        self.dispatch(vec![MutationRecord {
            target: parent,
            added_nodes: Vec::new(),
            removed_nodes: vec![node],
        }]);
        Ok(())
    }

    /// Registers a change-subscription on the subtree rooted at `target`.
    pub fn observe(&self, target: NodeId) -> MutationObserver {
        let id = self.inner.next_observer.get();
        self.inner.next_observer.set(id + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .observers
            .borrow_mut()
            .push(Registration { id, target, tx });
        MutationObserver {
            id,
            target,
            rx,
            document: Rc::downgrade(&self.inner),
        }
    }

    /// Number of live change-subscriptions.
    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .borrow()
            .iter()
            .filter(|reg| !reg.tx.is_closed())
            .count()
    }

    fn dispatch(&self, records: Vec<MutationRecord>) {
        if records.is_empty() {
            return;
        }
        let html = self.inner.html.borrow();
        let mut observers = self.inner.observers.borrow_mut();
        observers.retain(|reg| {
            let relevant: Vec<MutationRecord> = records
                .iter()
                .filter(|record| is_inclusive_ancestor(&html, reg.target, record.target))
                .cloned()
                .collect();
            if relevant.is_empty() {
                return !reg.tx.is_closed();
            }
            reg.tx.send(relevant).is_ok()
        });
    }
}

/// Receives batches of records for one observed subtree.
///
/// Dropping the observer disconnects it.
pub struct MutationObserver {
    id: u64,
    target: NodeId,
    rx: mpsc::UnboundedReceiver<Vec<MutationRecord>>,
    document: Weak<DocumentInner>,
}

impl MutationObserver {
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Next batch, or `None` once the document is gone.
    pub async fn next_batch(&mut self) -> Option<Vec<MutationRecord>> {
        self.rx.recv().await
    }

    pub fn disconnect(self) {}
}

impl Drop for MutationObserver {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(document) = self.document.upgrade() {
            // A busy registry prunes closed channels on the next dispatch.
            if let Ok(mut observers) = document.observers.try_borrow_mut() {
                observers.retain(|reg| reg.id != self.id);
            }
        }
    }
}

fn matching<'a>(
    start: NodeRef<'a, Node>,
    selector: &'a Selector,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    start
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |el| selector.matches(el))
}

fn is_inclusive_ancestor(html: &Html, ancestor: NodeId, node: NodeId) -> bool {
    match html.tree.get(node) {
        Some(n) => n.id() == ancestor || n.ancestors().any(|a| a.id() == ancestor),
        None => false,
    }
}

fn detach_children(html: &mut Html, node: NodeId) -> Result<Vec<NodeId>, DocumentError> {
    let children: Vec<NodeId> = html
        .tree
        .get(node)
        .ok_or(DocumentError::UnknownNode(node))?
        .children()
        .map(|c| c.id())
        .collect();
    for child in &children {
        if let Some(mut child) = html.tree.get_mut(*child) {
            child.detach();
        }
    }
    Ok(children)
}

/// Parses `fragment` and appends copies of its top-level nodes under `parent`.
fn graft(html: &mut Html, parent: NodeId, fragment: &str) -> Result<Vec<NodeId>, DocumentError> {
    if html.tree.get(parent).is_none() {
        return Err(DocumentError::UnknownNode(parent));
    }
    let parsed = Html::parse_fragment(fragment);
    let mut added = Vec::new();
    for source in parsed.root_element().children() {
        let mut target = html
            .tree
            .get_mut(parent)
            .ok_or(DocumentError::UnknownNode(parent))?;
        added.push(copy_subtree(&mut target, source));
    }
    Ok(added)
}

fn copy_subtree(parent: &mut NodeMut<'_, Node>, source: NodeRef<'_, Node>) -> NodeId {
    let mut copy = parent.append(source.value().clone());
    for child in source.children() {
        copy_subtree(&mut copy, child);
    }
    copy.id()
}
