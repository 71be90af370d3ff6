//! Config persistence
//!
//! [`FileConfigStore`] writes JSON to a temp file in the target directory and
//! renames it over the old file, so a crash mid-write leaves the previous
//! config intact.

use crate::config::SecurityConfig;
use crate::{Error, Result};
use directories::ProjectDirs;
use parking_lot::RwLock;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Application qualifier for the platform data directory
pub const APP_QUALIFIER: &str = "org";

/// Application organization for the platform data directory
pub const APP_ORG: &str = "keyward";

/// Application name for the platform data directory
pub const APP_NAME: &str = "keyward";

/// Config file name
pub const CONFIG_FILE: &str = "security.json";

/// Load/save boundary for [`SecurityConfig`]
pub trait ConfigStore: Send + Sync {
    /// Load the config, or defaults when nothing has been saved yet
    fn load(&self) -> Result<SecurityConfig>;

    /// Replace the stored config atomically
    fn save(&self, config: &SecurityConfig) -> Result<()>;
}

/// Platform data directory
pub fn data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| Error::Storage("cannot determine data directory".to_string()))?;
    Ok(dirs.data_dir().to_path_buf())
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform data directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(data_dir()?.join(CONFIG_FILE)))
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<SecurityConfig> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(SecurityConfig::default());
        }

        let data = std::fs::read(&self.path)?;
        let config: SecurityConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    fn save(&self, config: &SecurityConfig) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_vec_pretty(config)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Storage(format!("failed to replace config: {}", e.error)))?;

        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

/// In-memory store for tests
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: RwLock<Option<SecurityConfig>>,
    fail_saves: AtomicBool,
}

impl MemoryConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create holding `config`
    pub fn with_config(config: SecurityConfig) -> Self {
        Self {
            config: RwLock::new(Some(config)),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make subsequent saves fail with a storage error
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Last saved config
    pub fn snapshot(&self) -> Option<SecurityConfig> {
        self.config.read().clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<SecurityConfig> {
        Ok(self.config.read().clone().unwrap_or_default())
    }

    fn save(&self, config: &SecurityConfig) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Storage("simulated write failure".to_string()));
        }
        *self.config.write() = Some(config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::new(dir.path().join("security.json"));
        let loaded = store.load().unwrap();
        assert!(!loaded.is_configured());
        assert_eq!(loaded.privacy_levels, crate::config::DEFAULT_PRIVACY_LEVELS);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::new(dir.path().join("nested").join("security.json"));

        let mut config = SecurityConfig::default();
        config.privacy_levels = 5;
        config.rotation.reminder_days = 30;
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, config);
        assert!(store.path().exists());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("security.json");
        std::fs::write(&path, br#"{"privacyLevels": 0}"#).unwrap();
        assert!(matches!(
            FileConfigStore::new(&path).load(),
            Err(Error::Validation(_))
        ));

        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            FileConfigStore::new(&path).load(),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_oversized_lane_count_is_rejected_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("security.json");
        let crafted = serde_json::json!({
            "kdf": {
                "algorithm": "argon2id",
                "memory_kib": 1024,
                "iterations": 1,
                "parallelism": 0x2000_0000u32,
            }
        });
        std::fs::write(&path, crafted.to_string()).unwrap();
        assert!(matches!(
            FileConfigStore::new(&path).load(),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn test_memory_store_failure_injection() {
        let store = MemoryConfigStore::new();
        store.set_fail_saves(true);
        assert!(matches!(
            store.save(&SecurityConfig::default()),
            Err(Error::Storage(_))
        ));
        assert!(store.snapshot().is_none());

        store.set_fail_saves(false);
        store.save(&SecurityConfig::default()).unwrap();
        assert!(store.snapshot().is_some());
    }
}
