use crate::domain::model::{BindingInput, SiteRequest};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "site-binder")]
#[command(about = "Create, update and delete web server sites with validated bindings")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Host store file, overrides `host.store_path` from the config
    #[arg(long)]
    pub store: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List every site on the host
    List,
    /// Show one site by name or id
    Show {
        #[arg(long, conflicts_with = "id", required_unless_present = "id")]
        name: Option<String>,
        #[arg(long)]
        id: Option<u64>,
    },
    /// Create a new site
    Create(SiteArgs),
    /// Replace the settings and bindings of an existing site
    Update {
        #[arg(long)]
        id: u64,
        #[command(flatten)]
        site: SiteArgs,
    },
    /// Delete a site; unknown ids are ignored
    Delete {
        #[arg(long)]
        id: u64,
    },
    /// Parse bindings without touching any site
    Parse {
        #[command(flatten)]
        bindings: BindingArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SiteArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long = "path")]
    pub site_path: String,

    #[arg(long = "pool")]
    pub application_pool: Option<String>,

    #[command(flatten)]
    pub bindings: BindingArgs,
}

/// Repeated flags are zipped by position, like the web form's indexed fields.
#[derive(Debug, Clone, Args)]
pub struct BindingArgs {
    /// Binding such as http://example.com:80 (repeatable)
    #[arg(long = "binding")]
    pub user_inputs: Vec<String>,

    /// IP address for the binding at the same position, defaults to '*'
    #[arg(long = "ip")]
    pub ip_addresses: Vec<String>,

    /// Certificate name for https bindings at the same position
    #[arg(long = "certificate")]
    pub certificate_names: Vec<String>,
}

impl BindingArgs {
    pub fn to_inputs(&self) -> Vec<BindingInput> {
        self.user_inputs
            .iter()
            .enumerate()
            .map(|(i, input)| BindingInput {
                user_input: input.clone(),
                ip_address: self.ip_addresses.get(i).cloned().unwrap_or_default(),
                certificate_name: self.certificate_names.get(i).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

impl SiteArgs {
    pub fn to_request(&self) -> SiteRequest {
        SiteRequest {
            name: self.name.clone(),
            site_path: self.site_path.clone(),
            application_pool: self
                .application_pool
                .as_deref()
                .map(str::trim)
                .filter(|pool| !pool.is_empty())
                .map(str::to_string),
            bindings: self.bindings.to_inputs(),
        }
    }
}
