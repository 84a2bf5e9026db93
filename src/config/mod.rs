// Configuration module
// Public interface for configuration loading

mod loader;
pub mod persona;
mod settings;

pub use loader::{banter_home, load_config};
pub use persona::{Persona, PersonaCatalogue, Roster, RosterError, MAX_ROSTER, MIN_ROSTER};
pub use settings::{
    Config, CredentialsConfig, GatewayConfig, StorageConfig, TimingConfig, DEFAULT_GATEWAY_URL,
    DEFAULT_TITLE,
};
