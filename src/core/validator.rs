use crate::domain::model::{
    fields, ApplicationPool, Binding, ErrorKind, Site, SiteId, SiteRequest, ValidationError,
};
pub use crate::domain::rules::{bindings_conflict, hostnames_match, ip_overlaps};
use crate::utils::validation::{validate_non_empty_string, validate_path};

/// Checks candidate bindings against the bindings of `existing` sites,
/// skipping the site `exclude` (the site being updated), and against earlier
/// candidates in the same set. One error per conflicting candidate.
pub fn validate_bindings(
    candidates: &[Binding],
    existing: &[Site],
    exclude: Option<SiteId>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (index, candidate) in candidates.iter().enumerate() {
        let property = fields::indexed(fields::BINDING_USER_INPUT, index);

        let owner = existing
            .iter()
            .filter(|site| Some(site.id) != exclude)
            .find(|site| site.bindings.iter().any(|b| bindings_conflict(candidate, b)));

        if let Some(site) = owner {
            tracing::debug!(
                "Binding {} conflicts with site '{}' ({})",
                candidate.binding_information(),
                site.name,
                site.id
            );
            errors.push(ValidationError::new(
                ErrorKind::DuplicateBinding,
                &property,
                format!("The binding is already in use by the site '{}'.", site.name),
            ));
            continue;
        }

        if candidates[..index]
            .iter()
            .any(|earlier| bindings_conflict(candidate, earlier))
        {
            errors.push(ValidationError::new(
                ErrorKind::DuplicateBinding,
                &property,
                "The binding is specified more than once.",
            ));
        }
    }

    errors
}

/// Checks the non-binding fields of a request: name, site path, pool and
/// the presence of at least one binding.
pub fn validate_site_fields(
    request: &SiteRequest,
    existing: &[Site],
    pools: &[ApplicationPool],
    exclude: Option<SiteId>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if validate_non_empty_string(fields::NAME, &request.name).is_err() {
        errors.push(ValidationError::new(
            ErrorKind::MissingField,
            fields::NAME,
            "A site name is required.",
        ));
    } else if let Some(site) = existing
        .iter()
        .filter(|site| Some(site.id) != exclude)
        .find(|site| site.name.eq_ignore_ascii_case(request.name.trim()))
    {
        errors.push(ValidationError::new(
            ErrorKind::DuplicateName,
            fields::NAME,
            format!("The name '{}' is already used by site {}.", site.name, site.id),
        ));
    }

    if let Err(e) = validate_path(fields::SITE_PATH, request.site_path.trim()) {
        errors.push(ValidationError::new(
            ErrorKind::MissingField,
            fields::SITE_PATH,
            e.to_string(),
        ));
    }

    if let Some(pool) = &request.application_pool {
        if !pools.iter().any(|p| p.name.eq_ignore_ascii_case(pool)) {
            errors.push(ValidationError::new(
                ErrorKind::ApplicationPoolNotFound,
                fields::APPLICATION_POOL,
                format!("The application pool '{}' does not exist.", pool),
            ));
        }
    }

    if request.bindings.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::MissingField,
            fields::BINDING_USER_INPUT,
            "At least one binding is required.",
        ));
    }

    errors
}
