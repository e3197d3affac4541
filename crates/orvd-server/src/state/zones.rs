//! File-backed forbidden zone snapshot and delta.

use anyhow::{Context, Result};
use orvd_core::zones::{compute_delta, ZoneSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The zone snapshot and last delta on disk. All mutations go through one writer lock.
pub struct ZoneStore {
    zones_path: PathBuf,
    delta_path: PathBuf,
    writer: Mutex<()>,
}

impl ZoneStore {
    pub fn new(zones_path: impl Into<PathBuf>, delta_path: impl Into<PathBuf>) -> Self {
        Self {
            zones_path: zones_path.into(),
            delta_path: delta_path.into(),
            writer: Mutex::new(()),
        }
    }

    /// Create missing files as empty collections.
    pub async fn init(&self) -> Result<()> {
        let _guard = self.writer.lock().await;
        for path in [&self.zones_path, &self.delta_path] {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                continue;
            }
            write_set(path, &ZoneSet::default()).await?;
            info!("Initialized empty zone file {}", path.display());
        }
        Ok(())
    }

    pub async fn load(&self) -> Result<ZoneSet> {
        read_set(&self.zones_path).await
    }

    pub async fn load_delta(&self) -> Result<ZoneSet> {
        read_set(&self.delta_path).await
    }

    /// Raw snapshot file contents.
    pub async fn export(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.zones_path)
            .await
            .with_context(|| format!("read {}", self.zones_path.display()))
    }

    /// Apply `change` to the snapshot, persist it with the delta against the previous snapshot.
    pub async fn mutate<R>(&self, change: impl FnOnce(&mut ZoneSet) -> R) -> Result<(R, ZoneSet)> {
        let _guard = self.writer.lock().await;
        let old = self.load().await?;
        let mut new = old.clone();
        let result = change(&mut new);
        self.commit(&old, &new).await?;
        Ok((result, new))
    }

    /// Replace the whole snapshot.
    pub async fn replace(&self, mut new: ZoneSet) -> Result<ZoneSet> {
        new.round_coordinates();
        let _guard = self.writer.lock().await;
        let old = self.load().await?;
        self.commit(&old, &new).await?;
        Ok(new)
    }

    async fn commit(&self, old: &ZoneSet, new: &ZoneSet) -> Result<()> {
        let delta = compute_delta(old, new);
        write_set(&self.zones_path, new).await?;
        write_set(&self.delta_path, &delta).await?;
        debug!("Zone snapshot saved: {} zones, {} changes", new.len(), delta.len());
        Ok(())
    }
}

async fn read_set(path: &Path) -> Result<ZoneSet> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    ZoneSet::from_json(&text).with_context(|| format!("parse {}", path.display()))
}

async fn write_set(path: &Path, set: &ZoneSet) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = set.to_json_pretty()?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
