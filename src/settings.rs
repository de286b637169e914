use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::models::Modality;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    pub object_interval_ms: u64,
    pub face_interval_ms: u64,
    pub hand_interval_ms: u64,
    pub history_capacity: usize,
    pub identity_match_threshold: f32,
    pub interaction_distance: f32,
    pub interaction_log_capacity: usize,
    pub timeline_length: usize,
    pub export_dir: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            object_interval_ms: 1000,
            face_interval_ms: 500,
            hand_interval_ms: 100,
            history_capacity: 1000,
            identity_match_threshold: 100.0,
            interaction_distance: 300.0,
            interaction_log_capacity: 1000,
            timeline_length: 50,
            export_dir: PathBuf::from("."),
        }
    }
}

impl SessionSettings {
    /// Polling cadence for a modality; never shorter than one millisecond.
    pub fn interval_for(&self, modality: Modality) -> Duration {
        let ms = match modality {
            Modality::Object => self.object_interval_ms,
            Modality::Face => self.face_interval_ms,
            Modality::Hand => self.hand_interval_ms,
        };
        Duration::from_millis(ms.max(1))
    }
}

/// Settings backed by a JSON file. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<SessionSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    log::warn!(
                        "Ignoring malformed settings file {}: {err}",
                        path.display()
                    );
                    SessionSettings::default()
                }
            }
        } else {
            SessionSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn session(&self) -> SessionSettings {
        self.read().clone()
    }

    pub fn update_session(&self, settings: SessionSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: SessionSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &SessionSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.session();
        assert_eq!(settings.interval_for(Modality::Object), Duration::from_millis(1000));
        assert_eq!(settings.interval_for(Modality::Face), Duration::from_millis(500));
        assert_eq!(settings.interval_for(Modality::Hand), Duration::from_millis(100));
        assert_eq!(settings.history_capacity, 1000);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "faceIntervalMs": 250, "historyCapacity": 10 }"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().session();
        assert_eq!(settings.face_interval_ms, 250);
        assert_eq!(settings.history_capacity, 10);
        assert_eq!(settings.object_interval_ms, 1000);
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.session();
        settings.timeline_length = 5;
        store.update_session(settings).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.session().timeline_length, 5);
        reopened.reload().unwrap();
        assert_eq!(reopened.session().timeline_length, 5);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let settings = SessionSettings {
            hand_interval_ms: 0,
            ..SessionSettings::default()
        };
        assert_eq!(settings.interval_for(Modality::Hand), Duration::from_millis(1));
    }
}
