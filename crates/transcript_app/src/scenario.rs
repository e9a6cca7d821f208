//! Scripted sessions replayed against a live document.
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::SettingsOverrides;

/// One externally driven change to the document or its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// Let time pass, in milliseconds.
    Wait(u64),
    FinishLoading,
    PushState(String),
    ReplaceState(String),
    Back,
    SetHash(String),
    /// Append markup to the first element matching the selector.
    AppendHtml(String, String),
    SetInnerHtml(String, String),
    SetText(String, String),
    Remove(String),
    /// Deliver a `GET_TRANSCRIPT` request for the current location.
    Request,
    /// Make the tab with this id the active one on the controlling side.
    ActivateTab(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub url: String,
    pub html: String,
    /// Start with initial loading already finished.
    #[serde(default)]
    pub loaded: bool,
    #[serde(default)]
    pub settings: SettingsOverrides,
    #[serde(default)]
    pub steps: Vec<Step>,
}

pub fn load(path: &Path) -> anyhow::Result<Scenario> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading scenario {:?}", path))?;
    let scenario =
        ron::from_str(&content).with_context(|| format!("parsing scenario {:?}", path))?;
    Ok(scenario)
}
