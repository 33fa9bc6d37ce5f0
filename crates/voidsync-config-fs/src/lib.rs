// SPDX-License-Identifier: Apache-2.0
//! Filesystem-backed `ConfigStore`, storing one JSON file per key under the
//! platform config directory.

use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;
use voidsync_app_core::config::{ConfigError, ConfigStore};

/// Store configs as JSON files under the platform config directory.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory (e.g.
    /// `~/.config/voidsync`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "devsync", "voidsync")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        let base = proj.config_dir().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Create a store rooted at an explicit directory, bypassing platform
    /// config-dir resolution (used in tests and containerized deployments).
    pub fn at(base: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let filename = format!("{key}.json");
        self.base.join(filename)
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use voidsync_app_core::config::ConfigService;

    #[test]
    fn round_trips_a_value_through_a_temp_directory() {
        let dir = std::env::temp_dir().join(format!("voidsync-config-fs-test-{:?}", std::thread::current().id()));
        let store = FsConfigStore::at(dir.clone()).unwrap();
        let service = ConfigService::new(store);

        service.save("pipeline", &serde_json::json!({"pushPath": "/ws"})).unwrap();
        let loaded: serde_json::Value = service.load("pipeline").unwrap().unwrap();
        assert_eq!(loaded["pushPath"], "/ws");

        let _ = fs::remove_dir_all(dir);
    }
}
