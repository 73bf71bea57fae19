use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::config::Config;

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234";
pub const DEFAULT_MODEL: &str = "local-model";

/// Where to reach the model server. Persisted as `{"baseUrl": ..., "model": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    pub base_url: String,
    pub model: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ConnectionSettings {
    /// Trims both fields and puts the default back into any that end up blank.
    pub fn normalized(&self) -> Self {
        fn or_default(value: &str, default: &str) -> String {
            let trimmed = value.trim();
            if trimmed.is_empty() { default.to_string() } else { trimmed.to_string() }
        }

        ConnectionSettings {
            base_url: or_default(&self.base_url, DEFAULT_BASE_URL),
            model: or_default(&self.model, DEFAULT_MODEL),
        }
    }
}

pub trait SettingsStore: Send {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<ConnectionSettings>>;
    fn save(&self, settings: &ConnectionSettings) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Reads the persisted settings, falling back to defaults when they are
/// missing or unreadable.
pub fn load_or_default(store: &dyn SettingsStore) -> ConnectionSettings {
    match store.load() {
        Ok(Some(settings)) => settings.normalized(),
        Ok(None) => ConnectionSettings::default(),
        Err(e) => {
            eprintln!("Error reading saved settings: {}. Using defaults.", e);
            ConnectionSettings::default()
        }
    }
}

pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        FileSettingsStore { path }
    }

    pub fn default_location() -> Self {
        Self::new(Config::get_config_dir().join("settings.json"))
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Option<ConnectionSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let settings: ConnectionSettings = serde_json::from_str(&contents)?;
        Ok(Some(settings))
    }

    fn save(&self, settings: &ConnectionSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json)?;
        debug_eprintln!("[settings] wrote {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Keeps settings in memory only, optionally refusing every write.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySettingsStore {
    value: std::sync::Mutex<Option<ConnectionSettings>>,
    fail_writes: bool,
}

#[cfg(test)]
impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(settings: ConnectionSettings) -> Self {
        MemorySettingsStore {
            value: std::sync::Mutex::new(Some(settings)),
            fail_writes: false,
        }
    }

    /// A store whose `save` and `clear` always fail.
    pub fn failing() -> Self {
        MemorySettingsStore {
            value: std::sync::Mutex::new(None),
            fail_writes: true,
        }
    }
}

#[cfg(test)]
impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Option<ConnectionSettings>> {
        let value = self.value.lock().map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        Ok(value.clone())
    }

    fn save(&self, settings: &ConnectionSettings) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow::anyhow!("storage is read-only"));
        }
        let mut value = self.value.lock().map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        *value = Some(settings.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow::anyhow!("storage is read-only"));
        }
        let mut value = self.value.lock().map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        *value = None;
        Ok(())
    }
}
