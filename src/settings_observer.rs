//! Read access to the persisted preferences plus change notification.
//!
//! The controller only ever sees [`SettingsProvider`]; the service wires a
//! [`SettingsObservable`] so each change is re-posted onto the controller's
//! executor as a payload-free [`SettingKey`].

use crate::registry::Registry;
use crate::settings::{Settings, TimeoutDuration};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    Enabled,
    Timeout,
    SwipeToExit,
    TapsAppToExit,
}

pub trait SettingsProvider: Send + Sync {
    fn enabled(&self) -> bool;
    fn timeout(&self) -> TimeoutDuration;
    fn swipe_to_exit_enabled(&self) -> bool;
    fn taps_app_to_exit_enabled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

pub type SettingsCallback = Arc<dyn Fn(SettingKey) + Send + Sync>;

/// Observers may be invoked from any thread.
pub trait SettingsObservable: Send + Sync {
    fn add_observer(&self, callback: SettingsCallback) -> ObserverId;
    fn remove_observer(&self, id: ObserverId) -> bool;
}

/// JSON-backed settings with change notification.
///
/// Observers are only told about keys whose value actually changed.
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: Mutex<Settings>,
    observers: Mutex<Registry<SettingsCallback>>,
}

impl SettingsStore {
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            current: Mutex::new(settings),
            observers: Mutex::new(Registry::default()),
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let settings = Settings::load(&path)?;
        Ok(Self {
            path: Some(path),
            current: Mutex::new(settings),
            observers: Mutex::new(Registry::default()),
        })
    }

    pub fn snapshot(&self) -> Settings {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `f`, persist when file-backed, then notify observers of each
    /// changed key. Returns the changed keys.
    ///
    /// Nothing is committed if persisting fails.
    pub fn update<F>(&self, f: F) -> anyhow::Result<Vec<SettingKey>>
    where
        F: FnOnce(&mut Settings),
    {
        let changed = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            let mut next = current.clone();
            f(&mut next);
            if next == *current {
                return Ok(Vec::new());
            }
            if let Some(path) = &self.path {
                next.save(path)?;
            }
            let changed = changed_keys(&current, &next);
            *current = next;
            changed
        };
        self.notify(&changed);
        Ok(changed)
    }

    /// Re-read the backing file after an external edit.
    pub fn reload(&self) -> anyhow::Result<Vec<SettingKey>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        let fresh = Settings::load(path)?;
        let changed = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = changed_keys(&current, &fresh);
            *current = fresh;
            changed
        };
        self.notify(&changed);
        Ok(changed)
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn notify(&self, keys: &[SettingKey]) {
        if keys.is_empty() {
            return;
        }
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        for key in keys {
            tracing::debug!(?key, observers = observers.len(), "setting changed");
            for observer in &observers {
                observer(*key);
            }
        }
    }
}

fn changed_keys(before: &Settings, after: &Settings) -> Vec<SettingKey> {
    let mut keys = Vec::new();
    if before.enabled != after.enabled {
        keys.push(SettingKey::Enabled);
    }
    if before.timeout() != after.timeout() {
        keys.push(SettingKey::Timeout);
    }
    if before.swipe_to_exit != after.swipe_to_exit {
        keys.push(SettingKey::SwipeToExit);
    }
    if before.taps_app_to_exit != after.taps_app_to_exit {
        keys.push(SettingKey::TapsAppToExit);
    }
    keys
}

impl SettingsProvider for SettingsStore {
    fn enabled(&self) -> bool {
        self.snapshot().enabled
    }

    fn timeout(&self) -> TimeoutDuration {
        self.snapshot().timeout()
    }

    fn swipe_to_exit_enabled(&self) -> bool {
        self.snapshot().swipe_to_exit
    }

    fn taps_app_to_exit_enabled(&self) -> bool {
        self.snapshot().taps_app_to_exit
    }
}

impl SettingsObservable for SettingsStore {
    fn add_observer(&self, callback: SettingsCallback) -> ObserverId {
        let id = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(callback);
        ObserverId(id)
    }

    fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id.0)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_store(settings: Settings) -> (SettingsStore, Arc<Mutex<Vec<SettingKey>>>) {
        let store = SettingsStore::in_memory(settings);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.add_observer(Arc::new(move |key| sink.lock().unwrap().push(key)));
        (store, seen)
    }

    #[test]
    fn notifies_only_changed_keys() {
        let (store, seen) = recording_store(Settings::default());
        let changed = store
            .update(|s| {
                s.enabled = true;
                s.offset_percentage = 30;
            })
            .unwrap();
        assert_eq!(changed, vec![SettingKey::Enabled]);
        assert_eq!(*seen.lock().unwrap(), vec![SettingKey::Enabled]);
    }

    #[test]
    fn unchanged_update_is_silent() {
        let (store, seen) = recording_store(Settings::default());
        store.update(|s| s.enabled = false).unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn delivers_changes_in_order() {
        let (store, seen) = recording_store(Settings::default());
        store.update(|s| s.timeout_secs = 12).unwrap();
        store.update(|s| s.swipe_to_exit = true).unwrap();
        store.update(|s| s.taps_app_to_exit = false).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SettingKey::Timeout,
                SettingKey::SwipeToExit,
                SettingKey::TapsAppToExit
            ]
        );
        assert_eq!(store.timeout(), TimeoutDuration::Long);
    }

    #[test]
    fn removed_observer_is_not_called() {
        let store = SettingsStore::in_memory(Settings::default());
        let seen = Arc::new(Mutex::new(0));
        let sink = seen.clone();
        let id = store.add_observer(Arc::new(move |_| *sink.lock().unwrap() += 1));
        assert!(store.remove_observer(id));
        assert!(!store.remove_observer(id));
        store.update(|s| s.enabled = true).unwrap();
        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(store.observer_count(), 0);
    }

    #[test]
    fn failed_save_keeps_previous_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("settings.json");
        let store = SettingsStore::open(&path).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.add_observer(Arc::new(move |key| sink.lock().unwrap().push(key)));

        assert!(store.update(|s| s.enabled = true).is_err());
        assert!(!store.enabled());
        assert!(seen.lock().unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn file_backed_store_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();
        store.update(|s| s.enabled = true).unwrap();
        assert!(Settings::load(&path).unwrap().enabled);

        let mut edited = Settings::load(&path).unwrap();
        edited.swipe_to_exit = true;
        edited.save(&path).unwrap();
        assert_eq!(store.reload().unwrap(), vec![SettingKey::SwipeToExit]);
        assert!(store.swipe_to_exit_enabled());
    }
}
