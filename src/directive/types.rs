use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// 会话的记忆策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPolicy {
    /// 自动抽取并注入记忆
    #[default]
    Auto,
    /// 仅使用用户手动添加的记忆
    Manual,
    Off,
}

impl fmt::Display for MemoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryPolicy::Auto => "auto",
            MemoryPolicy::Manual => "manual",
            MemoryPolicy::Off => "off",
        };
        f.write_str(s)
    }
}

impl FromStr for MemoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(MemoryPolicy::Auto),
            "manual" => Ok(MemoryPolicy::Manual),
            "off" => Ok(MemoryPolicy::Off),
            other => Err(format!("unknown memory policy '{other}', expected auto|manual|off")),
        }
    }
}

/// 单个会话的行为配置
///
/// 持久化格式（camelCase）：
/// ```json
/// { "conversationId": "c1", "systemPrompt": "", "personality": "", "memoryPolicy": "auto", "lastUpdated": 1700000000000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub conversation_id: String,
    /// 缺省为空字符串，从不缺席
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub personality: String,
    /// 空串、`null` 与未知取值都读作 `auto`
    #[serde(default, deserialize_with = "lenient_memory_policy")]
    pub memory_policy: MemoryPolicy,
    /// Unix 毫秒
    #[serde(default)]
    pub last_updated: u64,
}

fn lenient_memory_policy<'de, D>(deserializer: D) -> Result<MemoryPolicy, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default())
}

impl Directive {
    /// 会话尚未保存过指令时呈现给调用方的默认视图（不会落盘）
    pub fn default_for(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            system_prompt: String::new(),
            personality: String::new(),
            memory_policy: MemoryPolicy::Auto,
            last_updated: 0,
        }
    }

    /// 预设去重所用的键
    pub fn preset_key(&self) -> (&str, &str, MemoryPolicy) {
        (&self.system_prompt, &self.personality, self.memory_policy)
    }
}
