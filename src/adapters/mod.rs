// Adapters layer: concrete host stores behind the domain ports.

pub mod file;
pub mod memory;
pub mod state;

pub use file::JsonFileSiteStore;
pub use memory::InMemorySiteStore;
pub use state::HostState;
