//! 文件持久化的 KV 存储
//!
//! | 层次 | 类型 | 作用 |
//! |------|------|------|
//! | 引擎 | [`JsonStore`] | 单个 JSON 文档 + 内存缓存 + 临时文件原子替换 |
//! | 指令 | [`crate::directive::DirectiveStore`] | 每个会话一条指令及其历史 |
//! | 记忆 | [`crate::memory::MemoryStore`] | 每个会话一组可单独启停的记忆条目 |
//!
//! ```rust,no_run
//! use conversation_store::store::{JsonStore, StoreOptions};
//!
//! # async fn example() -> conversation_store::error::Result<()> {
//! let store: JsonStore<serde_json::Value> =
//!     JsonStore::open("./data/misc", "misc.json", StoreOptions::default())?;
//! store.set("conv-1", serde_json::json!({"note": "hello"})).await?;
//! let value = store.get("conv-1").await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;

pub use engine::{Commit, CorruptPolicy, JsonStore, StoreMap, StoreOptions};

use std::time::{SystemTime, UNIX_EPOCH};

/// 当前 Unix 毫秒时间戳
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
