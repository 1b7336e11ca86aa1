use crate::store::now_millis;
use serde::{Deserialize, Serialize};

/// 会话中的一条记忆
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryItem {
    /// 会话内唯一，形如 `mem_<毫秒>_<随机后缀>`
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    /// Unix 毫秒
    pub timestamp: u64,
    pub enabled: bool,
}

impl MemoryItem {
    pub(crate) fn new(conversation_id: &str, content: impl Into<String>) -> Self {
        let timestamp = now_millis();
        Self {
            id: new_item_id(timestamp),
            conversation_id: conversation_id.to_string(),
            content: content.into(),
            timestamp,
            enabled: true,
        }
    }
}

/// 记忆条目的部分更新
///
/// `id` / `conversationId` 可以出现在请求体里，但合并时一律忽略。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl MemoryItemPatch {
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub(crate) fn apply_to(self, item: &mut MemoryItem) {
        if let Some(content) = self.content {
            item.content = content;
        }
        if let Some(timestamp) = self.timestamp {
            item.timestamp = timestamp;
        }
        if let Some(enabled) = self.enabled {
            item.enabled = enabled;
        }
    }
}

/// 时间 + 随机后缀；不做唯一性检查，碰撞概率可忽略
fn new_item_id(timestamp: u64) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("mem_{}_{}", timestamp, &suffix[..9])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_item_defaults() {
        let item = MemoryItem::new("c1", "likes tea");
        assert!(item.id.starts_with("mem_"));
        assert_eq!(item.conversation_id, "c1");
        assert!(item.enabled);
        assert!(item.timestamp > 0);
    }

    #[test]
    fn test_item_ids_differ() {
        let a = MemoryItem::new("c1", "a");
        let b = MemoryItem::new("c1", "b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_patch_ignores_identity_fields() {
        let mut item = MemoryItem::new("c1", "old");
        let original_id = item.id.clone();
        let patch: MemoryItemPatch = serde_json::from_value(json!({
            "id": "other",
            "conversationId": "c2",
            "content": "x"
        }))
        .unwrap();

        patch.apply_to(&mut item);
        assert_eq!(item.id, original_id);
        assert_eq!(item.conversation_id, "c1");
        assert_eq!(item.content, "x");
        assert!(item.enabled);
    }
}
