use crate::core::parser::BindingParser;
use crate::core::validator::{validate_bindings, validate_site_fields};
use crate::domain::model::{BindingIp, Site, SiteId, SiteRequest, ValidationError};
use crate::domain::ports::{CertificateStore, SiteRepository};
use crate::utils::error::{Result, SiteError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationState {
    Requested,
    Parsing,
    Validating,
    Applying,
    Committed,
    Rejected,
}

#[derive(Debug, Clone)]
pub enum Operation {
    Create(SiteRequest),
    Update { id: SiteId, request: SiteRequest },
    Delete { id: SiteId },
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Create(_) => "create",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
        }
    }
}

/// 操作結果：提交的站台，或可對應到表單欄位的錯誤清單
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "result")]
pub enum Outcome {
    Committed(Option<Site>),
    Rejected(Vec<ValidationError>),
}

impl Outcome {
    pub fn state(&self) -> OperationState {
        match self {
            Outcome::Committed(_) => OperationState::Committed,
            Outcome::Rejected(_) => OperationState::Rejected,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }
}

struct Tracker {
    operation: &'static str,
    state: OperationState,
}

impl Tracker {
    fn new(operation: &'static str) -> Self {
        tracing::debug!("{} site: {:?}", operation, OperationState::Requested);
        Self {
            operation,
            state: OperationState::Requested,
        }
    }

    fn advance(&mut self, next: OperationState) {
        tracing::debug!("{} site: {:?} -> {:?}", self.operation, self.state, next);
        self.state = next;
    }

    fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.advance(OperationState::Committed),
            Err(e) => {
                tracing::warn!(
                    "{} site rejected during {:?}: {}",
                    self.operation,
                    self.state,
                    e.user_friendly_message()
                );
                self.advance(OperationState::Rejected);
            }
        }
        result
    }
}

/// Parses, validates and applies site changes against an injected host.
///
/// Each operation runs strictly in sequence and validates against a host
/// snapshot taken within the same operation. Concurrent operations are not
/// serialised here; the repository is the final arbiter of conflicting writes.
pub struct SiteEngine<R: SiteRepository, C: CertificateStore> {
    repository: R,
    certificates: C,
    default_ip: BindingIp,
}

impl<R: SiteRepository, C: CertificateStore> SiteEngine<R, C> {
    pub fn new(repository: R, certificates: C) -> Self {
        Self {
            repository,
            certificates,
            default_ip: BindingIp::Wildcard,
        }
    }

    pub fn with_default_ip(mut self, default_ip: BindingIp) -> Self {
        self.default_ip = default_ip;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn create_site(&self, request: &SiteRequest) -> Result<Site> {
        let mut tracker = Tracker::new("create");
        let result = self.reconcile(&mut tracker, None, request).await;
        let site = tracker.finish(result)?;
        tracing::info!("Created site '{}' ({})", site.name, site.id);
        Ok(site)
    }

    pub async fn update_site(&self, id: SiteId, request: &SiteRequest) -> Result<Site> {
        let mut tracker = Tracker::new("update");
        let result = self.reconcile(&mut tracker, Some(id), request).await;
        let site = tracker.finish(result)?;
        tracing::info!("Updated site '{}' ({})", site.name, site.id);
        Ok(site)
    }

    /// Deleting an id the host does not know succeeds without changes.
    pub async fn delete_site(&self, id: SiteId) -> Result<()> {
        let mut tracker = Tracker::new("delete");
        tracker.advance(OperationState::Applying);
        let result = self.repository.delete_site(id).await;
        tracker.finish(result)?;
        tracing::info!("Deleted site {}", id);
        Ok(())
    }

    /// Runs any operation and folds the result into an [`Outcome`].
    pub async fn execute(&self, operation: Operation) -> Outcome {
        tracing::debug!("Executing {} operation", operation.name());
        let result = match &operation {
            Operation::Create(request) => self.create_site(request).await.map(Some),
            Operation::Update { id, request } => self.update_site(*id, request).await.map(Some),
            Operation::Delete { id } => self.delete_site(*id).await.map(|_| None),
        };

        match result {
            Ok(site) => Outcome::Committed(site),
            Err(e) => Outcome::Rejected(e.validation_errors()),
        }
    }

    async fn reconcile(
        &self,
        tracker: &mut Tracker,
        target: Option<SiteId>,
        request: &SiteRequest,
    ) -> Result<Site> {
        tracker.advance(OperationState::Parsing);
        let certificates = self.certificates.list_certificates().await?;
        let parser = BindingParser::new(&certificates).with_default_ip(self.default_ip);
        let bindings = parser
            .parse_all(&request.bindings)
            .map_err(SiteError::Rejected)?;

        tracker.advance(OperationState::Validating);
        let existing = self.repository.list_sites().await?;
        if let Some(id) = target {
            if !existing.iter().any(|site| site.id == id) {
                return Err(SiteError::SiteNotFound { id });
            }
        }
        let pools = self.repository.list_application_pools().await?;

        let mut errors = validate_site_fields(request, &existing, &pools, target);
        errors.extend(validate_bindings(&bindings, &existing, target));
        if !errors.is_empty() {
            return Err(SiteError::Rejected(errors));
        }

        tracker.advance(OperationState::Applying);
        let site = Site {
            id: target.unwrap_or(SiteId(0)),
            name: request.name.trim().to_string(),
            site_path: request.site_path.trim().to_string(),
            application_pool: request.application_pool.clone(),
            bindings,
        };

        let id = match target {
            Some(id) => {
                self.repository.update_site(id, &site).await?;
                id
            }
            None => self.repository.create_site(&site).await?,
        };

        // 回讀主機實際保存的內容
        self.repository
            .get_site_by_id(id)
            .await?
            .ok_or_else(|| SiteError::host_rejected(format!("site {} is not visible after write", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{HostState, InMemorySiteStore};
    use crate::domain::model::{BindingInput, ErrorKind};

    fn engine() -> (SiteEngine<InMemorySiteStore, InMemorySiteStore>, InMemorySiteStore) {
        let store = InMemorySiteStore::from_state(
            HostState::default()
                .with_application_pool("DefaultAppPool")
                .with_certificate("Servant", "0FA1"),
        );
        (SiteEngine::new(store.clone(), store.clone()), store)
    }

    fn request(name: &str, binding: &str) -> SiteRequest {
        SiteRequest {
            name: name.to_string(),
            site_path: r"c:\inetpub\wwwroot".to_string(),
            application_pool: None,
            bindings: vec![BindingInput::new(binding, "*", "Servant")],
        }
    }

    #[tokio::test]
    async fn test_execute_reports_terminal_states() {
        let (engine, _) = engine();

        let committed = engine
            .execute(Operation::Create(request("a", "http://a.com")))
            .await;
        assert_eq!(committed.state(), OperationState::Committed);

        let rejected = engine
            .execute(Operation::Create(request("b", "http://a.com")))
            .await;
        assert_eq!(rejected.state(), OperationState::Rejected);
        match rejected {
            Outcome::Rejected(errors) => {
                assert_eq!(errors[0].kind, ErrorKind::DuplicateBinding);
                assert_eq!(errors[0].property_name, "bindingsuserinput[0]");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_parse_errors_write_nothing() {
        let (engine, store) = engine();
        let result = engine
            .create_site(&request("bad", "http://bad%%host.com"))
            .await;

        match result {
            Err(SiteError::Rejected(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].kind, ErrorKind::InvalidBindingFormat);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(store.snapshot().await.sites.is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_site() {
        let (engine, _) = engine();
        let result = engine
            .update_site(SiteId(404), &request("ghost", "http://ghost.com"))
            .await;
        assert!(matches!(result, Err(SiteError::SiteNotFound { id }) if id == SiteId(404)));
    }

    #[tokio::test]
    async fn test_host_unavailable_aborts() {
        let (engine, store) = engine();
        store.set_available(false);

        let outcome = engine
            .execute(Operation::Create(request("a", "http://a.com")))
            .await;
        match outcome {
            Outcome::Rejected(errors) => assert_eq!(errors[0].kind, ErrorKind::HostUnavailable),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_default_ip_applies_to_blank_ip_field() {
        let (engine, _) = engine();
        let engine = engine.with_default_ip("10.1.1.1".parse().unwrap());

        let mut req = request("a", "http://a.com");
        req.bindings[0].ip_address = String::new();
        let site = engine.create_site(&req).await.unwrap();
        assert_eq!(site.bindings[0].ip.to_string(), "10.1.1.1");
    }
}
