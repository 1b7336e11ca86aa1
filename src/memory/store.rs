//! 会话记忆存储
//!
//! 单文件 `memory-store.json`：`conversationId` → [`MemoryItem`] 列表（追加顺序）。
//! 读取不存在的会话返回空列表。

use super::types::{MemoryItem, MemoryItemPatch};
use crate::error::Result;
use crate::store::{Commit, JsonStore, StoreOptions};
use std::path::Path;
use tracing::{debug, info};

const MEMORY_FILE: &str = "memory-store.json";

pub struct MemoryStore {
    items: JsonStore<Vec<MemoryItem>>,
}

impl MemoryStore {
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        Ok(Self {
            items: JsonStore::open(dir, MEMORY_FILE, options)?,
        })
    }

    pub async fn get_memory_items(&self, conversation_id: &str) -> Result<Vec<MemoryItem>> {
        Ok(self.items.get(conversation_id).await?.unwrap_or_default())
    }

    pub async fn add_memory_item(
        &self,
        conversation_id: &str,
        content: impl Into<String>,
    ) -> Result<MemoryItem> {
        let item = MemoryItem::new(conversation_id, content);
        let added = item.clone();
        self.items
            .update(|map| {
                map.entry(conversation_id.to_string()).or_default().push(item);
                Commit::Save(())
            })
            .await?;
        info!(conversation_id = %conversation_id, item_id = %added.id, "🧠 记忆已添加");
        Ok(added)
    }

    /// 会话或条目不存在时返回 `None`
    pub async fn update_memory_item(
        &self,
        conversation_id: &str,
        item_id: &str,
        patch: MemoryItemPatch,
    ) -> Result<Option<MemoryItem>> {
        let updated = self
            .items
            .update(|map| {
                let Some(item) = map
                    .get_mut(conversation_id)
                    .and_then(|items| items.iter_mut().find(|item| item.id == item_id))
                else {
                    return Commit::Skip(None);
                };
                patch.apply_to(item);
                Commit::Save(Some(item.clone()))
            })
            .await?;
        if updated.is_some() {
            debug!(conversation_id = %conversation_id, item_id = %item_id, "✏️ 记忆已更新");
        }
        Ok(updated)
    }

    pub async fn delete_memory_item(&self, conversation_id: &str, item_id: &str) -> Result<bool> {
        let deleted = self
            .items
            .update(|map| {
                let Some(items) = map.get_mut(conversation_id) else {
                    return Commit::Skip(false);
                };
                let before = items.len();
                items.retain(|item| item.id != item_id);
                if items.len() == before {
                    Commit::Skip(false)
                } else {
                    Commit::Save(true)
                }
            })
            .await?;
        if deleted {
            debug!(conversation_id = %conversation_id, item_id = %item_id, "🗑️ 记忆已删除");
        }
        Ok(deleted)
    }

    /// 用于注入 prompt 的条目，保持原顺序
    pub async fn get_enabled_memory_items(&self, conversation_id: &str) -> Result<Vec<MemoryItem>> {
        self.items
            .read(|map| {
                map.get(conversation_id)
                    .map(|items| items.iter().filter(|item| item.enabled).cloned().collect())
                    .unwrap_or_default()
            })
            .await
    }

    /// 删除整个会话的记忆；会话不存在时同样重写一次文件
    pub async fn clear_conversation_memory(&self, conversation_id: &str) -> Result<()> {
        self.items
            .update(|map| {
                map.shift_remove(conversation_id);
                Commit::Save(())
            })
            .await?;
        info!(conversation_id = %conversation_id, "🧹 会话记忆已清空");
        Ok(())
    }

    /// 有记忆记录的会话（取自 store 的 key，而非扫描目录）
    pub async fn list_conversations(&self) -> Result<Vec<String>> {
        self.items.keys().await
    }

    pub async fn clear_cache(&self) {
        self.items.clear_cache().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    const CONV: &str = "test-conv-123";

    fn open(dir: &Path) -> MemoryStore {
        MemoryStore::open(dir, StoreOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_add_memory_item() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        let item = store.add_memory_item(CONV, "Test memory content").await.unwrap();
        assert_eq!(item.conversation_id, CONV);
        assert_eq!(item.content, "Test memory content");
        assert!(item.enabled);
    }

    #[tokio::test]
    async fn test_items_persist_across_instances() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        let item = store.add_memory_item(CONV, "Persistent test memory").await.unwrap();

        let reopened = open(tmp.path());
        assert_eq!(reopened.get_memory_items(CONV).await.unwrap(), vec![item]);
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_empty() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        assert!(store.get_memory_items("non-existent").await.unwrap().is_empty());
        assert!(store.get_enabled_memory_items("non-existent").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_items_keep_append_order() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        for content in ["Memory 1", "Memory 2", "Memory 3"] {
            store.add_memory_item(CONV, content).await.unwrap();
        }
        let contents: Vec<_> = store
            .get_memory_items(CONV)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.content)
            .collect();
        assert_eq!(contents, vec!["Memory 1", "Memory 2", "Memory 3"]);
    }

    #[tokio::test]
    async fn test_update_memory_item() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        let item = store.add_memory_item(CONV, "Original content").await.unwrap();

        let patch = MemoryItemPatch::default()
            .content("Updated content")
            .enabled(false);
        let updated = store
            .update_memory_item(CONV, &item.id, patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, item.id);
        assert_eq!(updated.content, "Updated content");
        assert!(!updated.enabled);
        assert_eq!(open(tmp.path()).get_memory_items(CONV).await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn test_update_cannot_change_identity() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        let item = store.add_memory_item(CONV, "keep me").await.unwrap();

        let patch = MemoryItemPatch {
            id: Some("other".to_string()),
            conversation_id: Some("elsewhere".to_string()),
            ..MemoryItemPatch::default()
        }
        .content("x");
        let updated = store
            .update_memory_item(CONV, &item.id, patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, item.id);
        assert_eq!(updated.conversation_id, CONV);
        assert_eq!(updated.content, "x");
        assert!(store.get_memory_items("elsewhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        let patch = MemoryItemPatch::default().content("New content");
        assert_eq!(
            store.update_memory_item(CONV, "fake-id", patch.clone()).await.unwrap(),
            None
        );

        store.add_memory_item(CONV, "present").await.unwrap();
        assert_eq!(
            store.update_memory_item(CONV, "fake-id", patch).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_delete_memory_item() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        let item = store.add_memory_item(CONV, "To be deleted").await.unwrap();

        assert!(store.delete_memory_item(CONV, &item.id).await.unwrap());
        assert!(!store.delete_memory_item(CONV, &item.id).await.unwrap());
        assert!(!store.delete_memory_item("other-conv", &item.id).await.unwrap());
        assert!(store.get_memory_items(CONV).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enabled_filter_preserves_order() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        let first = store.add_memory_item(CONV, "first").await.unwrap();
        let second = store.add_memory_item(CONV, "second").await.unwrap();
        let third = store.add_memory_item(CONV, "third").await.unwrap();
        store
            .update_memory_item(CONV, &second.id, MemoryItemPatch::default().enabled(false))
            .await
            .unwrap();

        let enabled = store.get_enabled_memory_items(CONV).await.unwrap();
        assert_eq!(enabled, vec![first, third]);
    }

    #[tokio::test]
    async fn test_clear_conversation_memory() {
        let tmp = tempdir().unwrap();
        let store = open(tmp.path());
        store.add_memory_item(CONV, "one").await.unwrap();
        store.add_memory_item("other", "two").await.unwrap();

        store.clear_conversation_memory(CONV).await.unwrap();
        assert!(store.get_memory_items(CONV).await.unwrap().is_empty());
        assert_eq!(store.list_conversations().await.unwrap(), vec!["other".to_string()]);

        // 清空不存在的会话不报错
        store.clear_conversation_memory("never-seen").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_to_distinct_conversations_all_land() {
        let tmp = tempdir().unwrap();
        let store = Arc::new(open(tmp.path()));
        let n = 24;

        let tasks = (0..n).map(|i| {
            let store = store.clone();
            async move { store.add_memory_item(&format!("conv-{i}"), format!("fact {i}")).await }
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }

        let reopened = open(tmp.path());
        assert_eq!(reopened.list_conversations().await.unwrap().len(), n);
        for i in 0..n {
            let items = reopened.get_memory_items(&format!("conv-{i}")).await.unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].content, format!("fact {i}"));
        }
    }

    #[tokio::test]
    async fn test_overlapping_writers_from_separate_instances_lose_updates() {
        let tmp = tempdir().unwrap();
        let a = open(tmp.path());
        let b = open(tmp.path());
        // 两个实例都在对方写入前加载了缓存，没有跨实例失效
        assert!(a.get_memory_items(CONV).await.unwrap().is_empty());
        assert!(b.get_memory_items(CONV).await.unwrap().is_empty());

        a.add_memory_item(CONV, "from a").await.unwrap();
        a.add_memory_item("conv-only-a", "also from a").await.unwrap();
        b.add_memory_item(CONV, "from b").await.unwrap();

        // b 的整图保存覆盖了 a 的全部修改，包括另一个会话
        let fresh = open(tmp.path());
        let contents: Vec<_> = fresh
            .get_memory_items(CONV)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.content)
            .collect();
        assert_eq!(contents, vec!["from b"]);
        assert!(fresh.get_memory_items("conv-only-a").await.unwrap().is_empty());
    }
}
