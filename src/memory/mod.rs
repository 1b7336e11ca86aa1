//! 会话记忆
//!
//! 每个会话一组 [`MemoryItem`]，可单独启停、修改、删除；
//! 启用的条目由 [`MemoryStore::get_enabled_memory_items`] 取出注入 prompt。
//!
//! ```rust,no_run
//! use conversation_store::memory::{MemoryItemPatch, MemoryStore};
//! use conversation_store::store::StoreOptions;
//!
//! # async fn example() -> conversation_store::error::Result<()> {
//! let store = MemoryStore::open("./data/memory", StoreOptions::default())?;
//! let item = store.add_memory_item("conv-1", "用户偏好深色主题").await?;
//! store
//!     .update_memory_item("conv-1", &item.id, MemoryItemPatch::default().enabled(false))
//!     .await?;
//! let active = store.get_enabled_memory_items("conv-1").await?;
//! # Ok(())
//! # }
//! ```

pub mod store;
pub mod types;

pub use store::MemoryStore;
pub use types::{MemoryItem, MemoryItemPatch};
