use crate::adapters::state::HostState;
use crate::domain::model::{ApplicationPool, Certificate, Site, SiteId};
use crate::domain::ports::{CertificateStore, SiteRepository};
use crate::utils::error::{Result, SiteError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory host. Clones share the same state, so a test can hand one clone
/// to the engine and inspect the host through another.
#[derive(Clone)]
pub struct InMemorySiteStore {
    state: Arc<Mutex<HostState>>,
    available: Arc<AtomicBool>,
}

impl InMemorySiteStore {
    pub fn new() -> Self {
        Self::from_state(HostState::default())
    }

    pub fn from_state(state: HostState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulates the host going offline (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> HostState {
        self.state.lock().await.clone()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SiteError::HostUnavailable {
                message: "in-memory host is offline".to_string(),
            })
        }
    }
}

impl Default for InMemorySiteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteRepository for InMemorySiteStore {
    async fn list_sites(&self) -> Result<Vec<Site>> {
        self.ensure_available()?;
        Ok(self.state.lock().await.sites.clone())
    }

    async fn get_site_by_name(&self, name: &str) -> Result<Option<Site>> {
        self.ensure_available()?;
        Ok(self.state.lock().await.find_by_name(name).cloned())
    }

    async fn get_site_by_id(&self, id: SiteId) -> Result<Option<Site>> {
        self.ensure_available()?;
        Ok(self.state.lock().await.find_by_id(id).cloned())
    }

    async fn create_site(&self, site: &Site) -> Result<SiteId> {
        self.ensure_available()?;
        let id = self.state.lock().await.create(site)?;
        tracing::debug!("Created site '{}' with id {}", site.name, id);
        Ok(id)
    }

    async fn update_site(&self, id: SiteId, site: &Site) -> Result<()> {
        self.ensure_available()?;
        self.state.lock().await.update(id, site)
    }

    async fn delete_site(&self, id: SiteId) -> Result<()> {
        self.ensure_available()?;
        if !self.state.lock().await.delete(id) {
            tracing::debug!("Delete of unknown site {} ignored", id);
        }
        Ok(())
    }

    async fn list_application_pools(&self) -> Result<Vec<ApplicationPool>> {
        self.ensure_available()?;
        Ok(self.state.lock().await.application_pools.clone())
    }
}

#[async_trait]
impl CertificateStore for InMemorySiteStore {
    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        self.ensure_available()?;
        Ok(self.state.lock().await.certificates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Binding;

    #[tokio::test]
    async fn test_read_after_write() {
        let store = InMemorySiteStore::new();
        let site = Site {
            id: SiteId(0),
            name: "unit-test-site".to_string(),
            site_path: r"c:\inetpub\wwwroot".to_string(),
            application_pool: None,
            bindings: vec![Binding::http("unit-test-site.com", 80)],
        };

        let id = store.create_site(&site).await.unwrap();
        let fetched = store.get_site_by_name("unit-test-site").await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.bindings, site.bindings);
    }

    #[tokio::test]
    async fn test_offline_host() {
        let store = InMemorySiteStore::new();
        store.set_available(false);
        let err = tokio_test::assert_err!(store.list_sites().await);
        assert!(matches!(err, SiteError::HostUnavailable { .. }));

        store.set_available(true);
        let sites = tokio_test::assert_ok!(store.list_sites().await);
        assert!(sites.is_empty());
    }

    #[tokio::test]
    async fn test_builder_seeds_inventory() {
        let store = InMemorySiteStore::from_state(
            HostState::default()
                .with_application_pool("DefaultAppPool")
                .with_certificate("Servant", "ABC"),
        );

        assert_eq!(store.list_application_pools().await.unwrap().len(), 1);
        assert_eq!(store.list_certificates().await.unwrap()[0].name, "Servant");
    }
}
