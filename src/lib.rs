pub mod cli;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod memory;
pub mod store;

pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::context::Stores;
    pub use crate::directive::{Directive, DirectiveStore, MemoryPolicy, ProfileStore};
    pub use crate::error::{Result, StoreError};
    pub use crate::memory::{MemoryItem, MemoryItemPatch, MemoryStore};
    pub use crate::store::{CorruptPolicy, JsonStore, StoreOptions};
}
