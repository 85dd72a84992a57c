use crate::adapters::state::HostState;
use crate::domain::model::{ApplicationPool, Certificate, Site, SiteId};
use crate::domain::ports::{CertificateStore, SiteRepository};
use crate::utils::error::{Result, SiteError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

// 同一路徑的所有 handle 共用一把寫入鎖
static WRITE_LOCKS: LazyLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(Default::default);

fn write_lock_for(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = WRITE_LOCKS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    locks.entry(key).or_default().clone()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    state: HostState,
}

/// Host store persisted as a single JSON document.
///
/// Every call re-reads the file, so writes are visible to the next read and
/// nothing is cached between operations. Read-modify-write cycles are
/// serialised across every handle opened on the same path in this process.
#[derive(Debug, Clone)]
pub struct JsonFileSiteStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileSiteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            write_lock: write_lock_for(&path),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 檔案不存在時以給定的集區與憑證建立空白主機
    pub async fn ensure_initialized(
        &self,
        pools: &[ApplicationPool],
        certificates: &[Certificate],
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.path.exists() {
            return Ok(false);
        }

        let state = HostState {
            application_pools: pools.to_vec(),
            certificates: certificates.to_vec(),
            ..HostState::default()
        };
        self.save(&state)?;
        tracing::info!("Initialized host store at {}", self.path.display());
        Ok(true)
    }

    pub fn load(&self) -> Result<HostState> {
        if !self.path.exists() {
            return Ok(HostState::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| SiteError::HostUnavailable {
            message: format!("cannot read {}: {}", self.path.display(), e),
        })?;
        let document: StoreDocument =
            serde_json::from_str(&content).map_err(|e| SiteError::HostUnavailable {
                message: format!("corrupt host store {}: {}", self.path.display(), e),
            })?;
        Ok(document.state)
    }

    fn save(&self, state: &HostState) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let document = StoreDocument {
            updated_at: Some(Utc::now()),
            state: state.clone(),
        };
        let data = serde_json::to_vec_pretty(&document)?;

        // 先寫同目錄的獨立暫存檔再改名，讀取端不會看到寫到一半的檔案
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SiteError::IoError(e.error))?;

        tracing::debug!("Host store written to {}", self.path.display());
        Ok(())
    }

    /// Load, change and save under the path's write lock. Nothing is written
    /// when `change` fails.
    async fn modify<T>(&self, change: impl FnOnce(&mut HostState) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load()?;
        let result = change(&mut state)?;
        self.save(&state)?;
        Ok(result)
    }
}

#[async_trait]
impl SiteRepository for JsonFileSiteStore {
    async fn list_sites(&self) -> Result<Vec<Site>> {
        Ok(self.load()?.sites)
    }

    async fn get_site_by_name(&self, name: &str) -> Result<Option<Site>> {
        Ok(self.load()?.find_by_name(name).cloned())
    }

    async fn get_site_by_id(&self, id: SiteId) -> Result<Option<Site>> {
        Ok(self.load()?.find_by_id(id).cloned())
    }

    async fn create_site(&self, site: &Site) -> Result<SiteId> {
        self.modify(|state| state.create(site)).await
    }

    async fn update_site(&self, id: SiteId, site: &Site) -> Result<()> {
        self.modify(|state| state.update(id, site)).await
    }

    async fn delete_site(&self, id: SiteId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load()?;
        if state.delete(id) {
            self.save(&state)?;
        } else {
            tracing::debug!("Delete of unknown site {} ignored", id);
        }
        Ok(())
    }

    async fn list_application_pools(&self) -> Result<Vec<ApplicationPool>> {
        Ok(self.load()?.application_pools)
    }
}

#[async_trait]
impl CertificateStore for JsonFileSiteStore {
    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        Ok(self.load()?.certificates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Binding;
    use tempfile::TempDir;

    fn site(name: &str) -> Site {
        Site {
            id: SiteId(0),
            name: name.to_string(),
            site_path: r"c:\inetpub\wwwroot".to_string(),
            application_pool: None,
            bindings: vec![Binding::http(&format!("{}.com", name), 80)],
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_host() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSiteStore::new(dir.path().join("host.json"));

        assert!(store.list_sites().await.unwrap().is_empty());
        store.delete_site(SiteId(5)).await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_writes_survive_new_handle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("host.json");

        let id = JsonFileSiteStore::new(&path)
            .create_site(&site("alpha"))
            .await
            .unwrap();

        let reopened = JsonFileSiteStore::new(&path);
        let fetched = reopened.get_site_by_name("alpha").await.unwrap().unwrap();
        assert_eq!(fetched.id, id);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"updated_at\""));
        assert!(raw.contains("\"next_id\": 2"));

        // 暫存檔改名後不留在目錄中
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_handles_on_same_path_share_write_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("host.json");
        let a = JsonFileSiteStore::new(&path);
        let b = JsonFileSiteStore::new(dir.path().join(".").join("host.json"));
        let other = JsonFileSiteStore::new(dir.path().join("other.json"));

        assert!(Arc::ptr_eq(&a.write_lock, &b.write_lock));
        assert!(!Arc::ptr_eq(&a.write_lock, &other.write_lock));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_host_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("host.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonFileSiteStore::new(&path).list_sites().await;
        assert!(matches!(result, Err(SiteError::HostUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_ensure_initialized_only_once() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSiteStore::new(dir.path().join("host.json"));
        let pools = vec![ApplicationPool {
            name: "DefaultAppPool".to_string(),
        }];

        assert!(store.ensure_initialized(&pools, &[]).await.unwrap());
        assert!(!store.ensure_initialized(&[], &[]).await.unwrap());
        assert_eq!(store.list_application_pools().await.unwrap(), pools);
    }
}
