//! Persistent exporter preferences: recent files and the last save directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const MAX_RECENT_FILES: usize = 10;

/// Preferences that persist between sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    // Most recent first, max 10
    pub recent_files: Vec<PathBuf>,

    // Directory the legacy exporter wrote to last
    pub last_save_dir: Option<PathBuf>,
}

impl Preferences {
    /// Add a file to the recent files list (moves it to the top if already present)
    pub fn add_recent(&mut self, path: PathBuf) {
        self.recent_files.retain(|p| p != &path);
        self.recent_files.insert(0, path);
        self.recent_files.truncate(MAX_RECENT_FILES);
    }
}

/// Where preferences are read from and written back to.
pub trait PreferenceStore {
    fn get(&self) -> Preferences;

    fn set(&mut self, preferences: Preferences) -> Result<()>;

    fn recent_files(&self) -> Vec<PathBuf> {
        self.get().recent_files
    }

    fn last_save_dir(&self) -> Option<PathBuf> {
        self.get().last_save_dir
    }

    fn add_recent_file(&mut self, path: PathBuf) -> Result<()> {
        let mut preferences = self.get();
        preferences.add_recent(path);
        self.set(preferences)
    }

    fn set_last_save_dir(&mut self, dir: PathBuf) -> Result<()> {
        let mut preferences = self.get();
        preferences.last_save_dir = Some(dir);
        self.set(preferences)
    }
}

/// Preferences kept in a JSON file.
#[derive(Debug)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    current: Preferences,
}

impl JsonPreferenceStore {
    /// `<config dir>/usd-export/preferences.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("usd-export");
            p.push("preferences.json");
            p
        })
    }

    /// Load preferences from `path`. A missing file yields the defaults, as
    /// does a file that doesn't parse.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed preferences in {}: {err}", path.display());
                Preferences::default()
            }),
            Err(_) => Preferences::default(),
        };
        Self { path, current }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get(&self) -> Preferences {
        self.current.clone()
    }

    fn set(&mut self, preferences: Preferences) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(&preferences)?;
        fs::write(&self.path, json).with_context(|| format!("Failed to write {}", self.path.display()))?;
        self.current = preferences;
        Ok(())
    }
}

/// Preferences that live as long as the process.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    current: Preferences,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self) -> Preferences {
        self.current.clone()
    }

    fn set(&mut self, preferences: Preferences) -> Result<()> {
        self.current = preferences;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_files_are_unique_and_bounded() {
        let mut preferences = Preferences::default();
        for i in 0..12 {
            preferences.add_recent(PathBuf::from(format!("/tmp/{i}.usda")));
        }
        preferences.add_recent(PathBuf::from("/tmp/5.usda"));

        assert_eq!(preferences.recent_files.len(), MAX_RECENT_FILES);
        assert_eq!(preferences.recent_files[0], PathBuf::from("/tmp/5.usda"));
        assert_eq!(
            preferences.recent_files.iter().filter(|p| p.ends_with("5.usda")).count(),
            1
        );
        assert!(!preferences.recent_files.contains(&PathBuf::from("/tmp/0.usda")));
    }

    #[test]
    fn json_store_round_trips() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("preferences.json");

        let mut store = JsonPreferenceStore::open(&path);
        assert_eq!(store.get(), Preferences::default());

        store.add_recent_file(PathBuf::from("/exports/chair.usda")).unwrap();
        store.set_last_save_dir(PathBuf::from("/exports")).unwrap();

        let reopened = JsonPreferenceStore::open(&path);
        assert_eq!(reopened.recent_files(), vec![PathBuf::from("/exports/chair.usda")]);
        assert_eq!(reopened.last_save_dir(), Some(PathBuf::from("/exports")));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("preferences.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonPreferenceStore::open(&path);
        assert_eq!(store.get(), Preferences::default());
    }
}
