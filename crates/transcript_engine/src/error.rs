use std::time::Duration;

use ego_tree::NodeId;
use thiserror::Error;

/// Failures of the extraction layer. None of these escape the strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("caption container {selector} not found after {timeout:?}")]
    MountTimeout { selector: String, timeout: Duration },
    #[error("caption stream requested before the extractor was initialized")]
    Uninitialized,
    #[error("extractor was destroyed")]
    Detached,
    #[error("invalid selector {selector}: {message}")]
    InvalidSelector { selector: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("node {0:?} is not part of the document")]
    UnknownNode(NodeId),
    #[error("invalid selector {selector}: {message}")]
    InvalidSelector { selector: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("message channel closed")]
    Closed,
    #[error("transport failure: {0}")]
    Failed(String),
}
