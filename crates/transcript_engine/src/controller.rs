use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_info, engine_warn};
use transcript_core::{Message, TranscriptResponse};

use crate::error::TransportError;
use crate::messaging::{ChannelResponder, MessageRouter};

/// The controlling side's view of a browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tab {
    pub id: Option<u64>,
    pub url: Option<String>,
}

impl Tab {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            url: Some(url.into()),
        }
    }
}

/// Delivers a message to the page hosted in a tab and awaits its first reply.
#[async_trait(?Send)]
pub trait TabMessenger {
    async fn send(&self, tab_id: u64, message: Message) -> Result<Option<TranscriptResponse>, TransportError>;
}

/// Asks the active tab for its transcript whenever the active tab changes.
pub struct TabController<M> {
    messenger: M,
    current: Option<Tab>,
}

impl<M: TabMessenger> TabController<M> {
    pub fn new(messenger: M) -> Self {
        Self {
            messenger,
            current: None,
        }
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    pub fn current(&self) -> Option<&Tab> {
        self.current.as_ref()
    }

    /// Sends `GET_TRANSCRIPT` for a newly active tab and logs the reply.
    /// Returns whether a request was sent.
    pub async fn on_active_tab_changed(&mut self, tab: Option<Tab>) -> bool {
        let Some(tab) = tab else {
            return false;
        };
        if self.current.as_ref() == Some(&tab) {
            engine_debug!("active tab unchanged");
            return false;
        }
        self.current = Some(tab.clone());
        let Some(id) = tab.id else {
            engine_debug!("active tab has no id; nothing to ask");
            return false;
        };
        let url = tab.url.unwrap_or_default();
        engine_info!("requesting transcript from tab {} ({})", id, url);

        match self.messenger.send(id, Message::get_transcript(url)).await {
            Ok(Some(response)) => {
                engine_info!("tab {} answered with {} deltas", id, response.deltas.len());
                for delta in &response.deltas {
                    engine_debug!("  {} {:?}", delta.time.to_rfc3339(), delta.lines);
                }
            }
            Ok(None) => engine_info!("tab {} sent no transcript", id),
            Err(err) => engine_warn!("transcript request to tab {} failed: {}", id, err),
        }
        true
    }
}

/// Messenger that talks to an in-process router, treating every tab as the
/// one document the router serves.
pub struct LocalMessenger {
    router: Rc<MessageRouter>,
    reply_timeout: Duration,
}

impl LocalMessenger {
    pub fn new(router: Rc<MessageRouter>, reply_timeout: Duration) -> Self {
        Self { router, reply_timeout }
    }
}

#[async_trait(?Send)]
impl TabMessenger for LocalMessenger {
    async fn send(&self, tab_id: u64, message: Message) -> Result<Option<TranscriptResponse>, TransportError> {
        let (responder, mut replies) = ChannelResponder::new();
        if !self.router.accept(message, Rc::new(responder)) {
            engine_debug!("tab {} ignored the request", tab_id);
            return Ok(None);
        }
        match tokio::time::timeout(self.reply_timeout, replies.recv()).await {
            Ok(reply) => Ok(reply),
            Err(_) => Err(TransportError::Failed(format!(
                "no reply from tab {} within {:?}",
                tab_id, self.reply_timeout
            ))),
        }
    }
}
