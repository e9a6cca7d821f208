use std::rc::Rc;

use engine_logging::{engine_debug, engine_warn};
use transcript_core::hosts;

use crate::document::LiveDocument;
use crate::error::ExtractError;
use crate::extractor::{CaptionSelectors, DomCaptionExtractor, TranscriptExtractor};
use crate::settings::ExtractorSettings;

/// Builds a fresh extractor for every resolution.
pub type ExtractorFactory = Rc<dyn Fn() -> Box<dyn TranscriptExtractor>>;

/// Maps a locator to an extractor by site identifier.
///
/// Entries are tried in registration order and the first identifier
/// contained in the locator wins. Registering an identifier twice replaces
/// the earlier factory in place, so identifiers stay distinct.
#[derive(Default, Clone)]
pub struct Resolver {
    registry: Vec<(String, ExtractorFactory)>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in site bound to `document`.
    pub fn with_builtin_sites(
        document: LiveDocument,
        settings: ExtractorSettings,
    ) -> Result<Self, ExtractError> {
        let youtube = CaptionSelectors::youtube()?;
        let resolver = Self::new().register(
            hosts::YOUTUBE,
            Rc::new(move || {
                Box::new(DomCaptionExtractor::new(
                    hosts::YOUTUBE,
                    document.clone(),
                    youtube.clone(),
                    settings.clone(),
                )) as Box<dyn TranscriptExtractor>
            }),
        );
        Ok(resolver)
    }

    pub fn register(mut self, site: impl Into<String>, factory: ExtractorFactory) -> Self {
        let site = site.into();
        if site.is_empty() {
            engine_warn!("ignoring extractor registration with an empty site identifier");
            return self;
        }
        match self.registry.iter_mut().find(|(key, _)| *key == site) {
            Some(entry) => {
                engine_warn!("site {} registered twice; keeping the latest factory", site);
                entry.1 = factory;
            }
            None => self.registry.push((site, factory)),
        }
        self
    }

    /// Registered identifiers in match order.
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.registry.iter().map(|(site, _)| site.as_str())
    }

    /// Site identifier that would handle `locator`, without building anything.
    pub fn site_for(&self, locator: &str) -> Option<&str> {
        if locator.is_empty() {
            return None;
        }
        self.registry
            .iter()
            .find(|(site, _)| locator.contains(site.as_str()))
            .map(|(site, _)| site.as_str())
    }

    pub fn supports(&self, locator: &str) -> bool {
        self.site_for(locator).is_some()
    }

    /// New extractor for `locator`, or `None` when no site matches.
    pub fn resolve(&self, locator: &str) -> Option<Box<dyn TranscriptExtractor>> {
        if locator.is_empty() {
            return None;
        }
        let factory = self
            .registry
            .iter()
            .find(|(site, _)| locator.contains(site.as_str()))
            .map(|(_, factory)| factory.clone());
        match factory {
            Some(factory) => Some(factory()),
            None => {
                engine_debug!("no extractor registered for {}", locator);
                None
            }
        }
    }
}
