//! User preferences that survive restarts: dark mode and the AI answer
//! toggle. Loaded once at startup and written on every toggle.

use crate::utils::app_paths::AppPaths;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub dark_mode: bool,
    pub ai_search_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            ai_search_enabled: true,
        }
    }
}

pub trait PreferenceStore: Send + Sync {
    /// Saved preferences, `None` when nothing was saved yet
    fn load(&self) -> Result<Option<Preferences>>;

    fn save(&self, preferences: &Preferences) -> Result<()>;
}

/// TOML file, by default `preferences.toml` next to the config file
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(AppPaths::preferences_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> Result<Option<Preferences>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(Some(toml::from_str(&contents)?))
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(preferences)?)?;
        debug!(target: "prefs", "saved {:?} to {}", preferences, self.path.display());
        Ok(())
    }
}

/// Keeps preferences for the lifetime of the process only
#[derive(Default)]
pub struct MemoryPreferenceStore {
    saved: Mutex<Option<Preferences>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(preferences: Preferences) -> Self {
        Self {
            saved: Mutex::new(Some(preferences)),
        }
    }

    /// What was last saved, if anything
    pub fn saved(&self) -> Option<Preferences> {
        self.saved.lock().ok().and_then(|saved| *saved)
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Option<Preferences>> {
        Ok(self.saved())
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| anyhow::anyhow!("preference store lock poisoned"))?;
        *saved = Some(*preferences);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("prefs.toml"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("prefs.toml");
        let store = FilePreferenceStore::new(&path);
        store
            .save(&Preferences {
                dark_mode: true,
                ai_search_enabled: false,
            })
            .unwrap();

        let reopened = FilePreferenceStore::new(&path);
        let prefs = reopened.load().unwrap().unwrap();
        assert!(prefs.dark_mode);
        assert!(!prefs.ai_search_enabled);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        fs::write(&path, "dark_mode = true\n").unwrap();
        let prefs = FilePreferenceStore::new(&path).load().unwrap().unwrap();
        assert!(prefs.dark_mode);
        assert!(prefs.ai_search_enabled);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(store.saved(), None);
        assert_eq!(store.load().unwrap(), None);

        let prefs = Preferences {
            dark_mode: true,
            ai_search_enabled: true,
        };
        store.save(&prefs).unwrap();
        assert_eq!(store.load().unwrap(), Some(prefs));
    }
}
