//! 会话指令存储
//!
//! 两个文件，同一目录：
//!
//! | 文件 | 内容 |
//! |------|------|
//! | `directives.json` | `conversationId` → 当前 [`Directive`] |
//! | `directive-history.json` | `conversationId` → 最近被替换的指令（最多 [`HISTORY_LIMIT`] 条，旧的在前） |
//!
//! 保存新指令时先把旧值追加进历史并落盘，再提交新指令。
//! 两步之间崩溃时，历史里已有旧值而当前值仍未更新。

use super::types::{Directive, MemoryPolicy};
use crate::error::Result;
use crate::store::{Commit, JsonStore, StoreOptions, now_millis};
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 每个会话保留的历史条数
pub const HISTORY_LIMIT: usize = 10;

const DIRECTIVES_FILE: &str = "directives.json";
const HISTORY_FILE: &str = "directive-history.json";

pub struct DirectiveStore {
    directives: JsonStore<Directive>,
    history: JsonStore<Vec<Directive>>,
    options: StoreOptions,
    /// 串行化 "追加历史 + 提交新值" 这一整段
    commit_lock: Mutex<()>,
}

impl DirectiveStore {
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            directives: JsonStore::open(dir, DIRECTIVES_FILE, options)?,
            history: JsonStore::open(dir, HISTORY_FILE, options)?,
            options,
            commit_lock: Mutex::new(()),
        })
    }

    /// 未保存过时返回 `None`，需要默认视图请用 [`Directive::default_for`]
    pub async fn get_directive(&self, conversation_id: &str) -> Result<Option<Directive>> {
        self.directives.get(conversation_id).await
    }

    /// 整体替换会话指令，旧值进入历史
    pub async fn save_directive(
        &self,
        conversation_id: &str,
        system_prompt: impl Into<String>,
        personality: Option<String>,
        memory_policy: Option<MemoryPolicy>,
    ) -> Result<Directive> {
        let _commit = if self.options.serialize_writes {
            Some(self.commit_lock.lock().await)
        } else {
            None
        };

        let directive = Directive {
            conversation_id: conversation_id.to_string(),
            system_prompt: system_prompt.into(),
            personality: personality.unwrap_or_default(),
            memory_policy: memory_policy.unwrap_or_default(),
            last_updated: now_millis(),
        };

        if let Some(prior) = self.directives.get(conversation_id).await? {
            let retained = self
                .history
                .update(|history| {
                    let entries = history.entry(conversation_id.to_string()).or_default();
                    entries.push(prior);
                    if entries.len() > HISTORY_LIMIT {
                        let overflow = entries.len() - HISTORY_LIMIT;
                        entries.drain(..overflow);
                    }
                    Commit::Save(entries.len())
                })
                .await?;
            debug!(conversation_id = %conversation_id, retained, "📜 旧指令已写入历史");
        }

        self.directives.set(conversation_id, directive.clone()).await?;
        info!(
            conversation_id = %conversation_id,
            memory_policy = %directive.memory_policy,
            "📝 指令已保存"
        );
        Ok(directive)
    }

    /// 被替换过的指令，最早的在前
    pub async fn get_directive_history(&self, conversation_id: &str) -> Result<Vec<Directive>> {
        Ok(self.history.get(conversation_id).await?.unwrap_or_default())
    }

    /// 删除当前指令；历史保留，仍参与预设
    pub async fn delete_directive(&self, conversation_id: &str) -> Result<bool> {
        let deleted = self.directives.delete(conversation_id).await?;
        if deleted {
            info!(conversation_id = %conversation_id, "🗑️ 指令已删除");
        }
        Ok(deleted)
    }

    /// 所有会话历史中按 `(systemPrompt, personality, memoryPolicy)` 去重后的指令，
    /// 按会话首次写入历史的顺序、首次出现顺序排列
    pub async fn get_presets(&self) -> Result<Vec<Directive>> {
        self.history
            .read(|history| {
                let mut seen = HashSet::new();
                let mut presets = Vec::new();
                for directive in history.values().flatten() {
                    let (prompt, personality, policy) = directive.preset_key();
                    if seen.insert((prompt.to_string(), personality.to_string(), policy)) {
                        presets.push(directive.clone());
                    }
                }
                presets
            })
            .await
    }

    /// 有当前指令的会话，按首次保存顺序
    pub async fn list_conversations(&self) -> Result<Vec<String>> {
        self.directives.keys().await
    }

    pub async fn clear_cache(&self) {
        self.directives.clear_cache().await;
        self.history.clear_cache().await;
    }
}
