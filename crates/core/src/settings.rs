//! Persisted client settings.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::storage::{KeyValueStore, SETTINGS_KEY};

/// Client-side settings kept next to the state blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Gateway endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Push to the gateway after every mutation (debounced).
    #[serde(default = "Settings::default_remote_autosave")]
    pub remote_autosave: bool,
}

impl Settings {
    const fn default_remote_autosave() -> bool {
        true
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: None,
            remote_autosave: Self::default_remote_autosave(),
        }
    }
}

/// Load settings; missing or malformed data yields defaults.
pub fn load_settings(store: &dyn KeyValueStore) -> Settings {
    match store.get(SETTINGS_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("[Settings] Ignoring malformed settings: {}", e);
            Settings::default()
        }),
        Ok(None) => Settings::default(),
        Err(e) => {
            warn!("[Settings] Failed to read settings: {}", e);
            Settings::default()
        }
    }
}

pub fn save_settings(store: &dyn KeyValueStore, settings: &Settings) -> Result<()> {
    store.set(SETTINGS_KEY, &serde_json::to_string(settings)?)
}
