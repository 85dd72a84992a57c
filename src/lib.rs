pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};

pub use adapters::{InMemorySiteStore, JsonFileSiteStore};
pub use config::toml_config::ToolConfig;
pub use crate::core::{
    engine::{Operation, OperationState, Outcome, SiteEngine},
    parser::BindingParser,
};
pub use utils::error::{Result, SiteError};
