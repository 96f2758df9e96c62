use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::Mutex;

use thermostat_core::{PersistedSettings, RuntimeConfig, Setting};

pub fn data_dir() -> PathBuf {
    std::env::var("THERMOSTAT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.thermostat"))
}

/// Reads `runtime.json` from the data directory, falling back to defaults
/// when the file does not exist.
pub async fn load_runtime_config(dir: &Path) -> anyhow::Result<RuntimeConfig> {
    let path = dir.join("runtime.json");
    let mut runtime = match tokio::fs::read(&path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("invalid runtime config at {}", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => RuntimeConfig::default(),
        Err(err) => return Err(err.into()),
    };
    runtime.sanitize();
    Ok(runtime)
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<PersistedSettings>;
    async fn save(&self, settings: &PersistedSettings) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("settings.json"),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SettingsStore for FileStore {
    async fn load(&self) -> anyhow::Result<PersistedSettings> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(serde_json::from_slice::<PersistedSettings>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(PersistedSettings::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, settings: &PersistedSettings) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(settings)?;
        tokio::fs::write(&self.path, payload)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: Mutex<PersistedSettings>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new(settings: PersistedSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    pub async fn snapshot(&self) -> PersistedSettings {
        self.settings.lock().await.clone()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> anyhow::Result<PersistedSettings> {
        Ok(self.settings.lock().await.clone())
    }

    async fn save(&self, settings: &PersistedSettings) -> anyhow::Result<()> {
        *self.settings.lock().await = settings.clone();
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

pub struct SettingsWriter {
    store: Arc<dyn SettingsStore>,
    current: Mutex<PersistedSettings>,
}

impl SettingsWriter {
    pub fn new(store: Arc<dyn SettingsStore>, current: PersistedSettings) -> Self {
        Self {
            store,
            current: Mutex::new(current),
        }
    }

    pub async fn apply(&self, changes: &[Setting]) -> anyhow::Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut current = self.current.lock().await;
        for change in changes {
            change.apply(&mut current);
        }
        self.store
            .save(&current)
            .await
            .with_context(|| format!("failed to persist {} setting(s)", changes.len()))
    }

    pub async fn current(&self) -> PersistedSettings {
        self.current.lock().await.clone()
    }
}
