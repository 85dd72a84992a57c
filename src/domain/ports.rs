use crate::domain::model::{ApplicationPool, Certificate, Site, SiteId};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Capability over the host's site and binding store.
///
/// Implementations must be read-after-write consistent: a `create_site`
/// that returns `Ok` is immediately visible to `get_site_by_name`.
#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// Fails with `HostUnavailable` when the store cannot be reached.
    async fn list_sites(&self) -> Result<Vec<Site>>;

    async fn get_site_by_name(&self, name: &str) -> Result<Option<Site>>;

    async fn get_site_by_id(&self, id: SiteId) -> Result<Option<Site>>;

    /// The id carried by `site` is ignored; the host assigns one.
    async fn create_site(&self, site: &Site) -> Result<SiteId>;

    async fn update_site(&self, id: SiteId, site: &Site) -> Result<()>;

    /// Deleting an unknown id succeeds.
    async fn delete_site(&self, id: SiteId) -> Result<()>;

    async fn list_application_pools(&self) -> Result<Vec<ApplicationPool>>;
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn list_certificates(&self) -> Result<Vec<Certificate>>;
}
