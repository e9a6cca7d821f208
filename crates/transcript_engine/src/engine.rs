use std::cell::RefCell;
use std::rc::Rc;

use engine_logging::engine_info;

use crate::document::LiveDocument;
use crate::error::ExtractError;
use crate::messaging::MessageRouter;
use crate::resolver::Resolver;
use crate::settings::EngineSettings;
use crate::strategy::Strategy;
use crate::watcher::Watcher;

/// Composition root: one resolver, strategy, watcher and router per document.
pub struct TranscriptEngine {
    document: LiveDocument,
    strategy: Rc<RefCell<Strategy>>,
    watcher: Watcher,
    router: Rc<MessageRouter>,
}

impl TranscriptEngine {
    /// Wires the engine with the built-in sites.
    pub fn new(document: LiveDocument, settings: EngineSettings) -> Result<Self, ExtractError> {
        let resolver = Resolver::with_builtin_sites(document.clone(), settings.extractor.clone())?;
        Ok(Self::with_resolver(document, resolver, settings))
    }

    pub fn with_resolver(document: LiveDocument, resolver: Resolver, settings: EngineSettings) -> Self {
        let strategy = Rc::new(RefCell::new(Strategy::new(Rc::new(resolver), document.clone())));
        let watcher = Watcher::new(
            strategy.clone(),
            document.history().clone(),
            settings.debounce_window,
        );
        let router = Rc::new(MessageRouter::new(strategy.clone(), settings.response_mode));
        Self {
            document,
            strategy,
            watcher,
            router,
        }
    }

    /// Starts watching. Must be called from within a tokio `LocalSet`.
    pub fn start(&mut self) -> bool {
        engine_info!("transcript engine starting at {}", self.document.location());
        self.watcher.watch()
    }

    pub fn stop(&mut self) {
        self.watcher.unwatch();
        engine_info!("transcript engine stopped");
    }

    pub fn document(&self) -> &LiveDocument {
        &self.document
    }

    pub fn strategy(&self) -> &Rc<RefCell<Strategy>> {
        &self.strategy
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    pub fn router(&self) -> Rc<MessageRouter> {
        self.router.clone()
    }
}
