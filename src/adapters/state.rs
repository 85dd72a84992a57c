use crate::domain::model::{fields, ApplicationPool, Certificate, Site, SiteId};
use crate::domain::rules::bindings_conflict;
use crate::utils::error::{Result, SiteError};
use serde::{Deserialize, Serialize};

/// Snapshot of everything a host holds: sites, pools and certificates.
///
/// Both shipped adapters apply writes through this type so they enforce the
/// same host-level rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostState {
    #[serde(default = "first_id")]
    pub next_id: u64,
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub application_pools: Vec<ApplicationPool>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
}

fn first_id() -> u64 {
    1
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            next_id: first_id(),
            sites: Vec::new(),
            application_pools: Vec::new(),
            certificates: Vec::new(),
        }
    }
}

impl HostState {
    pub fn with_application_pool(mut self, name: &str) -> Self {
        self.application_pools.push(ApplicationPool {
            name: name.to_string(),
        });
        self
    }

    pub fn with_certificate(mut self, name: &str, thumbprint: &str) -> Self {
        self.certificates.push(Certificate {
            name: name.to_string(),
            thumbprint: thumbprint.to_string(),
        });
        self
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Site> {
        self.sites
            .iter()
            .find(|site| site.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn find_by_id(&self, id: SiteId) -> Option<&Site> {
        self.sites.iter().find(|site| site.id == id)
    }

    pub fn create(&mut self, site: &Site) -> Result<SiteId> {
        self.check_write(site, None)?;

        // 手動編輯過的檔案可能缺少 next_id，仍不可重複配發
        let in_use = self.sites.iter().map(|s| s.id.0 + 1).max().unwrap_or(0);
        let id = SiteId(self.next_id.max(in_use));
        self.next_id = id.0 + 1;
        self.sites.push(Site {
            id,
            ..site.clone()
        });
        Ok(id)
    }

    pub fn update(&mut self, id: SiteId, site: &Site) -> Result<()> {
        if self.find_by_id(id).is_none() {
            return Err(SiteError::SiteNotFound { id });
        }
        self.check_write(site, Some(id))?;

        if let Some(slot) = self.sites.iter_mut().find(|s| s.id == id) {
            *slot = Site {
                id,
                ..site.clone()
            };
        }
        Ok(())
    }

    /// Returns whether a site was removed.
    pub fn delete(&mut self, id: SiteId) -> bool {
        let before = self.sites.len();
        self.sites.retain(|site| site.id != id);
        before != self.sites.len()
    }

    // 主機端最後一道防線：名稱、路徑、應用程式集區與綁定唯一性
    fn check_write(&self, site: &Site, exclude: Option<SiteId>) -> Result<()> {
        if self
            .sites
            .iter()
            .any(|s| Some(s.id) != exclude && s.name.eq_ignore_ascii_case(site.name.trim()))
        {
            return Err(SiteError::DuplicateName {
                name: site.name.clone(),
            });
        }

        if site.site_path.trim().is_empty() {
            return Err(SiteError::host_rejected_field(
                fields::SITE_PATH,
                "The site path is empty.",
            ));
        }

        if let Some(pool) = &site.application_pool {
            if !self
                .application_pools
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case(pool))
            {
                return Err(SiteError::host_rejected_field(
                    fields::APPLICATION_POOL,
                    format!("The application pool '{}' does not exist.", pool),
                ));
            }
        }

        for (index, binding) in site.bindings.iter().enumerate() {
            let taken = self
                .sites
                .iter()
                .filter(|s| Some(s.id) != exclude)
                .flat_map(|s| s.bindings.iter())
                .chain(site.bindings[..index].iter())
                .any(|other| bindings_conflict(binding, other));
            if taken {
                return Err(SiteError::host_rejected_field(
                    &fields::indexed(fields::BINDING_USER_INPUT, index),
                    format!("The binding {} is already in use.", binding.binding_information()),
                ));
            }
        }

        Ok(())
    }
}
