use crate::domain::model::{ErrorKind, SiteId, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Site request rejected with {} error(s)", .0.len())]
    Rejected(Vec<ValidationError>),

    #[error("A site named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Site {id} does not exist")]
    SiteNotFound { id: SiteId },

    #[error("Host rejected the operation: {message}")]
    HostRejected {
        field: Option<String>,
        message: String,
    },

    #[error("Host store unavailable: {message}")]
    HostUnavailable { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, SiteError>;

impl SiteError {
    pub fn host_rejected(message: impl Into<String>) -> Self {
        Self::HostRejected {
            field: None,
            message: message.into(),
        }
    }

    pub fn host_rejected_field(field: &str, message: impl Into<String>) -> Self {
        Self::HostRejected {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            // 以第一個欄位錯誤代表整批
            Self::Rejected(errors) => errors
                .first()
                .map(|e| e.kind)
                .unwrap_or(ErrorKind::HostRejected),
            Self::DuplicateName { .. } => ErrorKind::DuplicateName,
            Self::SiteNotFound { .. } => ErrorKind::SiteNotFound,
            Self::HostRejected { .. } => ErrorKind::HostRejected,
            Self::HostUnavailable { .. } | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorKind::HostUnavailable
            }
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorKind::MissingField
            }
        }
    }

    /// 轉換為可回報給呼叫端的欄位錯誤清單
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        match self {
            Self::Rejected(errors) => errors.clone(),
            Self::DuplicateName { .. } => vec![ValidationError::new(
                ErrorKind::DuplicateName,
                crate::domain::model::fields::NAME,
                self.to_string(),
            )],
            Self::SiteNotFound { .. } => {
                vec![ValidationError::new(ErrorKind::SiteNotFound, "site", self.to_string())]
            }
            Self::HostRejected { field, message } => vec![ValidationError::new(
                ErrorKind::HostRejected,
                field.as_deref().unwrap_or("site"),
                message.clone(),
            )],
            Self::ConfigError { .. } => {
                vec![ValidationError::new(self.kind(), "config", self.to_string())]
            }
            Self::InvalidConfigValueError { field, .. } => {
                vec![ValidationError::new(self.kind(), field, self.to_string())]
            }
            Self::HostUnavailable { .. } | Self::IoError(_) | Self::SerializationError(_) => {
                vec![ValidationError::new(ErrorKind::HostUnavailable, "host", self.to_string())]
            }
        }
    }

    /// 請求本身被拒絕（相對於主機或設定失敗）
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected(_)
                | Self::DuplicateName { .. }
                | Self::SiteNotFound { .. }
                | Self::HostRejected { .. }
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Rejected(errors) => errors
                .iter()
                .map(|e| format!("{}: {}", e.property_name, e.message))
                .collect::<Vec<_>>()
                .join("; "),
            Self::HostUnavailable { .. } | Self::IoError(_) => {
                format!("The web server host could not be reached ({})", self)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_rejected_keeps_field_attribution() {
        let err = SiteError::host_rejected_field("sitepath", "path does not exist");
        let errors = err.validation_errors();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property_name, "sitepath");
        assert_eq!(errors[0].kind, ErrorKind::HostRejected);
        assert!(err.is_rejection());
    }

    #[test]
    fn test_rejected_reports_every_error() {
        let err = SiteError::Rejected(vec![
            ValidationError::new(ErrorKind::InvalidBindingFormat, "bindingsuserinput[0]", "a"),
            ValidationError::new(ErrorKind::DuplicateBinding, "bindingsuserinput[1]", "b"),
        ]);

        assert_eq!(err.kind(), ErrorKind::InvalidBindingFormat);
        assert_eq!(err.validation_errors().len(), 2);
        assert!(err.is_rejection());
        assert_eq!(
            err.user_friendly_message(),
            "bindingsuserinput[0]: a; bindingsuserinput[1]: b"
        );
    }

    #[test]
    fn test_host_unavailable_attributed_to_host() {
        let err = SiteError::HostUnavailable {
            message: "store offline".to_string(),
        };
        let errors = err.validation_errors();
        assert_eq!(errors[0].property_name, "host");
        assert_eq!(errors[0].kind, ErrorKind::HostUnavailable);
        assert!(!err.is_rejection());
    }
}
