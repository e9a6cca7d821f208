use serde::{Deserialize, Serialize};

use crate::CaptionDelta;

/// Requests arriving over the message channel, keyed by their `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Start forwarding captions for the document at `url`.
    #[serde(rename = "GET_TRANSCRIPT")]
    GetTranscript { url: String },
    /// Any other message type. Ignored by every handler.
    #[serde(other)]
    Unknown,
}

impl Message {
    pub fn get_transcript(url: impl Into<String>) -> Self {
        Message::GetTranscript { url: url.into() }
    }
}

/// Reply sent back through the responder: every delta observed so far, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub deltas: Vec<CaptionDelta>,
}

impl TranscriptResponse {
    pub fn new(deltas: Vec<CaptionDelta>) -> Self {
        Self { deltas }
    }
}
