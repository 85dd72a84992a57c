pub mod engine;
pub mod parser;
pub mod validator;

pub use crate::domain::model::{Binding, BindingInput, Site, SiteId, SiteRequest, ValidationError};
pub use crate::domain::ports::{CertificateStore, SiteRepository};
pub use crate::utils::error::Result;
