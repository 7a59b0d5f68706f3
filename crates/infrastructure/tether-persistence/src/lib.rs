mod api;
mod codec;
mod config_store;
mod error;
mod maintenance;
mod memory;
mod redb_store;

pub use api::*;
pub use config_store::{
    ClientSettings, ConcurrencySettings, ConfigStore, Configuration, ServerSettings,
    CONFIG_FILENAME,
};
pub use error::*;
pub use memory::MemoryMetadataStore;
pub use redb_store::RedbMetadataStore;
