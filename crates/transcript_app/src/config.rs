//! Optional RON settings file for the app.
use std::fs;
use std::path::Path;
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use serde::{Deserialize, Serialize};
use transcript_engine::{EngineSettings, ExtractionMode, ResponseMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeSetting {
    Snapshot,
    AddedText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseSetting {
    Stream,
    Snapshot,
}

/// Overrides on top of [`EngineSettings::default`]. Absent fields keep the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOverrides {
    pub debounce_ms: Option<u64>,
    pub mount_timeout_ms: Option<u64>,
    pub mode: Option<ModeSetting>,
    pub response: Option<ResponseSetting>,
}

impl SettingsOverrides {
    pub fn apply(&self, mut settings: EngineSettings) -> EngineSettings {
        if let Some(ms) = self.debounce_ms {
            settings.debounce_window = Duration::from_millis(ms);
        }
        if let Some(ms) = self.mount_timeout_ms {
            settings.extractor.mount_timeout = Duration::from_millis(ms);
        }
        if let Some(mode) = self.mode {
            settings.extractor.mode = match mode {
                ModeSetting::Snapshot => ExtractionMode::Snapshot,
                ModeSetting::AddedText => ExtractionMode::AddedText,
            };
        }
        if let Some(response) = self.response {
            settings.response_mode = match response {
                ResponseSetting::Stream => ResponseMode::Stream,
                ResponseSetting::Snapshot => ResponseMode::Snapshot,
            };
        }
        settings
    }
}

/// Reads overrides from `path`. A missing or unreadable file yields no overrides.
pub fn load_overrides(path: &Path) -> SettingsOverrides {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            engine_info!("No settings file at {:?}; using defaults", path);
            return SettingsOverrides::default();
        }
        Err(err) => {
            engine_warn!("Failed to read settings from {:?}: {}", path, err);
            return SettingsOverrides::default();
        }
    };

    match ron::from_str(&content) {
        Ok(overrides) => {
            engine_info!("Loaded settings from {:?}", path);
            overrides
        }
        Err(err) => {
            engine_warn!("Failed to parse settings from {:?}: {}", path, err);
            SettingsOverrides::default()
        }
    }
}
