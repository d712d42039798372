//! # User Settings Store
//!
//! Sectioned user settings (`field`, `space`, `energy`, `time`) with
//! merge-by-section updates and change notification.
//!
//! Every update is broadcast as a [`SettingsChange`]. Subscribers decide what
//! to do based on the [`ChangeOrigin`]: the controller only re-evaluates on
//! user changes, so its own write-backs never loop.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::simulation::ThermalType;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown settings section `{0}`")]
    UnknownSection(String),
    #[error("invalid patch for `{section}`: {reason}")]
    InvalidPatch {
        section: SettingsSection,
        reason: String,
    },
    #[error("settings snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SettingsSection {
    Field,
    Space,
    Energy,
    Time,
}

impl SettingsSection {
    pub const ALL: [SettingsSection; 4] = [
        SettingsSection::Field,
        SettingsSection::Space,
        SettingsSection::Energy,
        SettingsSection::Time,
    ];
}

/// Household behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    pub base_load_kw: f64,
    pub background_flux: f64,
    pub habit: String,
    pub autopilot: bool,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            base_load_kw: 0.85,
            background_flux: 0.75,
            habit: "HOME_OFFICE".to_string(),
            autopilot: true,
        }
    }
}

/// Indoor/outdoor climate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceSettings {
    pub outdoor_temp: f64,
    pub indoor_target: f64,
    /// Use `outdoor_temp` as entered instead of live weather
    #[serde(rename = "override")]
    pub manual_override: bool,
}

impl Default for SpaceSettings {
    fn default() -> Self {
        Self {
            outdoor_temp: 14.5,
            indoor_target: 22.0,
            manual_override: false,
        }
    }
}

/// Installed hardware and building envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergySettings {
    pub midea_tier: String,
    pub battery_modules: u32,
    pub pv_efficiency: f64,
    pub thermal_type: ThermalType,
    pub thermal_coefficient: f64,
    /// Learned thermal coefficient, used when `thermal_type` is `AI_FINGERPRINT`
    pub fingerprint_val: f64,
    pub dhw_target: f64,
    pub dhw_tank_volume: f64,
}

impl Default for EnergySettings {
    fn default() -> Self {
        Self {
            midea_tier: crate::simulation::DEFAULT_TIER_ID.to_string(),
            battery_modules: 3,
            pv_efficiency: 0.18,
            thermal_type: ThermalType::BrickVeneer,
            thermal_coefficient: 1.2,
            fingerprint_val: 0.82,
            dhw_target: 55.0,
            dhw_tank_volume: 200.0,
        }
    }
}

/// Tariff price overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSettings {
    pub peak_price: f64,
    pub offpeak_price: f64,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            peak_price: 0.38,
            offpeak_price: 0.15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub field: FieldSettings,
    pub space: SpaceSettings,
    pub energy: EnergySettings,
    pub time: TimeSettings,
}

impl Settings {
    pub fn section_value(&self, section: SettingsSection) -> Result<Value, SettingsError> {
        let value = match section {
            SettingsSection::Field => serde_json::to_value(&self.field)?,
            SettingsSection::Space => serde_json::to_value(&self.space)?,
            SettingsSection::Energy => serde_json::to_value(&self.energy)?,
            SettingsSection::Time => serde_json::to_value(&self.time)?,
        };
        Ok(value)
    }

    /// Shallow-merge `patch` into one section. Keys the section does not know are ignored.
    pub fn merge_section(
        &mut self,
        section: SettingsSection,
        patch: &Map<String, Value>,
    ) -> Result<(), SettingsError> {
        let mut current = match self.section_value(section)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            if current.contains_key(key) {
                current.insert(key.clone(), value.clone());
            } else {
                debug!(%section, key = %key, "ignoring unknown settings key");
            }
        }
        let merged = Value::Object(current);
        match section {
            SettingsSection::Field => self.field = decode(section, merged)?,
            SettingsSection::Space => self.space = decode(section, merged)?,
            SettingsSection::Energy => self.energy = decode(section, merged)?,
            SettingsSection::Time => self.time = decode(section, merged)?,
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(section: SettingsSection, value: Value) -> Result<T, SettingsError> {
    serde_json::from_value(value).map_err(|e| SettingsError::InvalidPatch {
        section,
        reason: e.to_string(),
    })
}

/// Partial settings keyed by section name, e.g. `{"field": {"base_load_kw": 1.2}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsDelta(BTreeMap<String, Map<String, Value>>);

impl SettingsDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, section: SettingsSection, key: &str, value: impl Into<Value>) {
        self.0
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn get(&self, section: SettingsSection, key: &str) -> Option<&Value> {
        self.0.get(&section.to_string()).and_then(|m| m.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|m| m.is_empty())
    }

    /// Resolve section names; fails on the first unknown one
    fn resolve(&self) -> Result<Vec<(SettingsSection, &Map<String, Value>)>, SettingsError> {
        self.0
            .iter()
            .filter(|(_, patch)| !patch.is_empty())
            .map(|(name, patch)| {
                SettingsSection::from_str(name)
                    .map(|s| (s, patch))
                    .map_err(|_| SettingsError::UnknownSection(name.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    /// UI, API or advisor command
    User,
    /// Write-back from the evaluation cycle
    Engine,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsChange {
    pub origin: ChangeOrigin,
    pub sections: Vec<SettingsSection>,
    pub settings: Settings,
}

pub struct ConfigStore {
    settings: RwLock<Settings>,
    // serializes merge, persist and broadcast so disk and subscribers see commit order
    commit_lock: Mutex<()>,
    changes: broadcast::Sender<SettingsChange>,
    snapshot_path: Option<PathBuf>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl ConfigStore {
    pub fn new(settings: Settings) -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            settings: RwLock::new(settings),
            commit_lock: Mutex::new(()),
            changes,
            snapshot_path: None,
        }
    }

    /// Load from a JSON snapshot if one exists; later updates are written back to it.
    ///
    /// An unreadable or malformed snapshot is logged and replaced by defaults on
    /// the next update.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let settings = if path.exists() {
            match load_snapshot(&path) {
                Ok(loaded) => {
                    info!(path = %path.display(), "loaded settings snapshot");
                    loaded
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        path = %path.display(),
                        "unusable settings snapshot, using defaults"
                    );
                    Settings::default()
                }
            }
        } else {
            info!(path = %path.display(), "no settings snapshot, using defaults");
            Settings::default()
        };
        let mut store = Self::new(settings);
        store.snapshot_path = Some(path);
        store
    }

    pub fn snapshot(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.changes.subscribe()
    }

    pub fn update_section(
        &self,
        section: SettingsSection,
        patch: &Value,
        origin: ChangeOrigin,
    ) -> Result<Settings, SettingsError> {
        let patch = patch
            .as_object()
            .ok_or_else(|| SettingsError::InvalidPatch {
                section,
                reason: "patch must be a JSON object".to_string(),
            })?;
        self.commit(vec![(section, patch)], origin)
    }

    /// Apply several sections at once. Nothing is applied if any section fails.
    pub fn apply_delta(
        &self,
        delta: &SettingsDelta,
        origin: ChangeOrigin,
    ) -> Result<Settings, SettingsError> {
        if delta.is_empty() {
            return Ok(self.snapshot());
        }
        self.commit(delta.resolve()?, origin)
    }

    fn commit(
        &self,
        patches: Vec<(SettingsSection, &Map<String, Value>)>,
        origin: ChangeOrigin,
    ) -> Result<Settings, SettingsError> {
        let _commit = self.commit_lock.lock();
        let updated = {
            let mut guard = self.settings.write();
            let mut next = guard.clone();
            for (section, patch) in &patches {
                next.merge_section(*section, patch)?;
            }
            *guard = next.clone();
            next
        };

        let mut sections: Vec<SettingsSection> = patches.iter().map(|(s, _)| *s).collect();
        sections.sort();
        sections.dedup();
        debug!(%origin, ?sections, "settings updated");

        self.persist(&updated);
        // No receivers is fine
        let _ = self.changes.send(SettingsChange {
            origin,
            sections,
            settings: updated.clone(),
        });
        Ok(updated)
    }

    fn persist(&self, settings: &Settings) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let result = serde_json::to_vec_pretty(settings)
            .map_err(SettingsError::from)
            .and_then(|bytes| std::fs::write(path, bytes).map_err(SettingsError::from));
        if let Err(e) = result {
            warn!(error = %e, path = %path.display(), "failed to write settings snapshot");
        }
    }
}

fn load_snapshot(path: &Path) -> Result<Settings, SettingsError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.field.base_load_kw, 0.85);
        assert!(s.field.autopilot);
        assert_eq!(s.space.indoor_target, 22.0);
        assert_eq!(s.energy.midea_tier, "ARCTIC_12");
        assert_eq!(s.energy.thermal_type, ThermalType::BrickVeneer);
        assert_eq!(s.time.offpeak_price, 0.15);
    }

    #[test]
    fn test_override_wire_name() {
        let v = serde_json::to_value(SpaceSettings::default()).unwrap();
        assert_eq!(v["override"], false);
        assert!(v.get("manual_override").is_none());
    }

    #[test]
    fn test_missing_keys_filled_from_defaults() {
        let s: Settings =
            serde_json::from_value(json!({"field": {"base_load_kw": 2.0}, "time": {}})).unwrap();
        assert_eq!(s.field.base_load_kw, 2.0);
        assert_eq!(s.field.background_flux, 0.75);
        assert_eq!(s.energy, EnergySettings::default());
    }

    #[test]
    fn test_update_merges_section() {
        let store = ConfigStore::default();
        let updated = store
            .update_section(
                SettingsSection::Space,
                &json!({"indoor_target": 20.5, "bogus": 1}),
                ChangeOrigin::User,
            )
            .unwrap();
        assert_eq!(updated.space.indoor_target, 20.5);
        assert_eq!(updated.space.outdoor_temp, 14.5);
        assert_eq!(store.snapshot(), updated);
    }

    #[test]
    fn test_non_object_patch_rejected() {
        let store = ConfigStore::default();
        let err = store
            .update_section(SettingsSection::Field, &json!(3), ChangeOrigin::User)
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidPatch { .. }));
    }

    #[test]
    fn test_wrong_type_rejected_and_state_unchanged() {
        let store = ConfigStore::default();
        let err = store
            .update_section(
                SettingsSection::Energy,
                &json!({"battery_modules": "lots"}),
                ChangeOrigin::User,
            )
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidPatch { .. }));
        assert_eq!(store.snapshot(), Settings::default());
    }

    #[test]
    fn test_delta_with_unknown_section_is_atomic() {
        let store = ConfigStore::default();
        let delta: SettingsDelta = serde_json::from_value(json!({
            "field": {"base_load_kw": 3.0},
            "galaxy": {"x": 1}
        }))
        .unwrap();
        let err = store.apply_delta(&delta, ChangeOrigin::User).unwrap_err();
        assert!(matches!(err, SettingsError::UnknownSection(ref s) if s == "galaxy"));
        assert_eq!(store.snapshot().field.base_load_kw, 0.85);
    }

    #[tokio::test]
    async fn test_change_notification_carries_origin() {
        let store = ConfigStore::default();
        let mut rx = store.subscribe();

        let mut delta = SettingsDelta::new();
        delta.set(SettingsSection::Field, "base_load_kw", 1.4);
        delta.set(SettingsSection::Space, "outdoor_temp", 9.0);
        store.apply_delta(&delta, ChangeOrigin::Engine).unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.origin, ChangeOrigin::Engine);
        assert_eq!(
            change.sections,
            vec![SettingsSection::Field, SettingsSection::Space]
        );
        assert_eq!(change.settings.field.base_load_kw, 1.4);
    }

    #[test]
    fn test_empty_delta_is_silent() {
        let store = ConfigStore::default();
        let mut rx = store.subscribe();
        store
            .apply_delta(&SettingsDelta::new(), ChangeOrigin::User)
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_snapshot_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = ConfigStore::open(&path);
        store
            .update_section(
                SettingsSection::Energy,
                &json!({"midea_tier": "ARCTIC_14", "battery_modules": 4}),
                ChangeOrigin::User,
            )
            .unwrap();
        assert!(path.exists());

        let reopened = ConfigStore::open(&path);
        assert_eq!(reopened.snapshot().energy.midea_tier, "ARCTIC_14");
        assert_eq!(reopened.snapshot().energy.battery_modules, 4);
    }

    #[test]
    fn test_malformed_snapshot_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = ConfigStore::open(&path);
        assert_eq!(store.snapshot(), Settings::default());

        // the next update replaces the bad file
        store
            .update_section(
                SettingsSection::Time,
                &json!({"peak_price": 0.4}),
                ChangeOrigin::User,
            )
            .unwrap();
        let reopened = ConfigStore::open(&path);
        assert_eq!(reopened.snapshot().time.peak_price, 0.4);
    }

    #[test]
    fn test_concurrent_commits_persist_last_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = ConfigStore::open(&path);
        let mut rx = store.subscribe();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for j in 0..10 {
                        let load = 1.0 + i as f64 + j as f64 / 100.0;
                        let delta: SettingsDelta =
                            serde_json::from_value(json!({"field": {"base_load_kw": load}}))
                                .unwrap();
                        store.apply_delta(&delta, ChangeOrigin::User).unwrap();
                    }
                });
            }
        });

        let on_disk = ConfigStore::open(&path).snapshot();
        assert_eq!(on_disk, store.snapshot());

        // the last broadcast carries the final in-memory state
        let mut last = None;
        loop {
            match rx.try_recv() {
                Ok(change) => last = Some(change.settings),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert_eq!(last, Some(store.snapshot()));
    }
}
