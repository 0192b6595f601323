//! Durable sector and warp knowledge.
//!
//! Two write-through stores backed by JSON files in the data directory.
//! Everything loads into memory at startup; every mutation rewrites the
//! file. The maps are small (a game universe tops out at 20,000 sectors)
//! so whole-file rewrites stay cheap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;
use warptty_core::models::TradeStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What we remember about a sector between sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorRecord {
    pub id: u32,
    pub fuel: Option<TradeStatus>,
    pub org: Option<TradeStatus>,
    pub equ: Option<TradeStatus>,
    /// When port guards last caught us here.
    pub busted: Option<DateTime<Utc>>,
}

impl SectorRecord {
    /// Build a record from a three-letter port class code like "BBS".
    /// Sectors without a usable port still get a record so they count as
    /// explored.
    pub fn from_port_class(id: u32, class: Option<&str>) -> Self {
        let mut record = SectorRecord {
            id,
            ..Default::default()
        };
        if let Some(class) = class {
            let mut chars = class.chars();
            record.fuel = chars.next().and_then(TradeStatus::from_class_char);
            record.org = chars.next().and_then(TradeStatus::from_class_char);
            record.equ = chars.next().and_then(TradeStatus::from_class_char);
        }
        record
    }

    fn same_trading(&self, other: &SectorRecord) -> bool {
        self.fuel == other.fuel && self.org == other.org && self.equ == other.equ
    }
}

struct FileMap<V> {
    path: PathBuf,
    map: HashMap<u32, V>,
}

impl<V: Serialize + DeserializeOwned> FileMap<V> {
    async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let map = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, map })
    }

    async fn save(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&self.map)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

/// Persistent per-sector trade profiles and bust stamps.
#[derive(Clone)]
pub struct SectorStore {
    inner: Arc<Mutex<FileMap<SectorRecord>>>,
}

impl SectorStore {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let inner = FileMap::load(path.as_ref().to_path_buf()).await?;
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    pub async fn get(&self, id: u32) -> Option<SectorRecord> {
        self.inner.lock().await.map.get(&id).cloned()
    }

    /// Store the record if its trade profile differs from what we have,
    /// carrying any existing bust stamp forward.
    pub async fn update_if_changed(&self, mut record: SectorRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.map.get(&record.id) {
            if existing.same_trading(&record) {
                return Ok(());
            }
            if record.busted.is_none() {
                record.busted = existing.busted;
            }
        }
        inner.map.insert(record.id, record);
        inner.save().await
    }

    /// Stamp a known sector as busted. Unknown sectors are ignored; a bust
    /// can only happen at a port we have already seen.
    pub async fn mark_busted(&self, id: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.map.get_mut(&id) {
            Some(record) => {
                record.busted = Some(Utc::now());
            }
            None => {
                warn!(sector = id, "bust in a sector with no stored record");
                return Ok(());
            }
        }
        inner.save().await
    }
}

/// Persistent warp adjacency, `from -> [to, ...]`.
#[derive(Clone)]
pub struct WarpStore {
    inner: Arc<Mutex<FileMap<Vec<u32>>>>,
}

impl WarpStore {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let inner = FileMap::load(path.as_ref().to_path_buf()).await?;
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    pub async fn get(&self, from: u32) -> Option<Vec<u32>> {
        self.inner.lock().await.map.get(&from).cloned()
    }

    pub async fn exists(&self, from: u32, to: u32) -> bool {
        self.inner
            .lock()
            .await
            .map
            .get(&from)
            .map(|warps| warps.contains(&to))
            .unwrap_or(false)
    }

    /// Record a sector's outbound warps the first time they are seen.
    /// Warp lists never change mid-game, so a present key is left alone.
    pub async fn add_if_absent(&self, from: u32, warps: Vec<u32>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.map.contains_key(&from) {
            return Ok(());
        }
        inner.map.insert(from, warps);
        inner.save().await
    }

    /// Of the given sectors, the ones we have no warp data for.
    pub async fn trim_explored(&self, sectors: &[u32]) -> Vec<u32> {
        let inner = self.inner.lock().await;
        sectors
            .iter()
            .copied()
            .filter(|s| !inner.map.contains_key(s))
            .collect()
    }
}

/// Both stores, loaded from the data directory.
#[derive(Clone)]
pub struct Stores {
    pub sectors: SectorStore,
    pub warps: WarpStore,
}

impl Stores {
    pub async fn load(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = data_dir.as_ref();
        Ok(Self {
            sectors: SectorStore::load(dir.join("sectors.json")).await?,
            warps: WarpStore::load(dir.join("warps.json")).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_survives_reload() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("sectors.json");

        let store = SectorStore::load(&path).await.expect("load empty");
        store
            .update_if_changed(SectorRecord::from_port_class(42, Some("BBS")))
            .await
            .expect("update");

        let reloaded = SectorStore::load(&path).await.expect("reload");
        let record = reloaded.get(42).await.expect("present");
        assert_eq!(record.fuel, Some(TradeStatus::Buying));
        assert_eq!(record.equ, Some(TradeStatus::Selling));
    }

    #[tokio::test]
    async fn test_update_preserves_bust_stamp() {
        let dir = TempDir::new().expect("tempdir");
        let store = SectorStore::load(dir.path().join("sectors.json"))
            .await
            .expect("load");

        store
            .update_if_changed(SectorRecord::from_port_class(7, Some("BBS")))
            .await
            .expect("seed");
        store.mark_busted(7).await.expect("bust");

        // trade profile flips; the stamp must survive
        store
            .update_if_changed(SectorRecord::from_port_class(7, Some("SSB")))
            .await
            .expect("update");

        let record = store.get(7).await.expect("present");
        assert_eq!(record.org, Some(TradeStatus::Selling));
        assert!(record.busted.is_some());
    }

    #[tokio::test]
    async fn test_bust_in_unknown_sector_is_ignored() {
        let dir = TempDir::new().expect("tempdir");
        let store = SectorStore::load(dir.path().join("sectors.json"))
            .await
            .expect("load");
        store.mark_busted(999).await.expect("no-op");
        assert!(store.get(999).await.is_none());
    }

    #[tokio::test]
    async fn test_same_profile_is_not_rewritten() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("sectors.json");
        let store = SectorStore::load(&path).await.expect("load");

        store
            .update_if_changed(SectorRecord::from_port_class(3, Some("SBB")))
            .await
            .expect("seed");
        let first = tokio::fs::metadata(&path).await.expect("meta").modified();

        store
            .update_if_changed(SectorRecord::from_port_class(3, Some("SBB")))
            .await
            .expect("no-op");
        let second = tokio::fs::metadata(&path).await.expect("meta").modified();
        assert_eq!(first.ok(), second.ok());
    }

    #[tokio::test]
    async fn test_warps_write_once() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("warps.json");
        let store = WarpStore::load(&path).await.expect("load");

        store
            .add_if_absent(100, vec![101, 102])
            .await
            .expect("add");
        store.add_if_absent(100, vec![999]).await.expect("no-op");

        assert_eq!(store.get(100).await, Some(vec![101, 102]));
        assert!(store.exists(100, 102).await);
        assert!(!store.exists(100, 999).await);
    }

    #[tokio::test]
    async fn test_trim_explored() {
        let dir = TempDir::new().expect("tempdir");
        let store = WarpStore::load(dir.path().join("warps.json"))
            .await
            .expect("load");
        store.add_if_absent(1, vec![2]).await.expect("add");
        store.add_if_absent(2, vec![1, 3]).await.expect("add");

        assert_eq!(store.trim_explored(&[1, 2, 3, 4]).await, vec![3, 4]);
    }
}
