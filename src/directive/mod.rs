//! 会话指令：system prompt、人格、记忆策略
//!
//! - [`DirectiveStore`]：每个会话一条当前指令 + 最近 10 条被替换的历史
//! - [`ProfileStore`]：用户级、具名、可复用的指令档案
//!
//! ```rust,no_run
//! use conversation_store::directive::{DirectiveStore, MemoryPolicy};
//! use conversation_store::store::StoreOptions;
//!
//! # async fn example() -> conversation_store::error::Result<()> {
//! let store = DirectiveStore::open("./data/directives", StoreOptions::default())?;
//! store
//!     .save_directive("conv-1", "You are a careful reviewer.", None, Some(MemoryPolicy::Manual))
//!     .await?;
//! let presets = store.get_presets().await?;
//! # Ok(())
//! # }
//! ```

pub mod profiles;
pub mod store;
pub mod types;

pub use profiles::{
    DirectiveProfile, ProfileDraft, ProfilePatch, ProfilePreset, ProfileStore, builtin_presets,
};
pub use store::{DirectiveStore, HISTORY_LIMIT};
pub use types::{Directive, MemoryPolicy};
