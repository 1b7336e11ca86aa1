//! 用户级指令档案
//!
//! 与按会话绑定的 [`super::Directive`] 不同，档案属于用户，有名字，可被反复套用到新会话。
//! 存储于 `profiles.json`：`userId` → 档案列表（创建顺序）。

use crate::error::{Result, StoreError};
use crate::store::{Commit, JsonStore, StoreOptions, now_millis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const PROFILES_FILE: &str = "profiles.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveProfile {
    /// UUID v4
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub personality: String,
    /// 自由文本的补充要求，每行一条
    #[serde(default)]
    pub directives: String,
    /// 自由文本描述，例如 "Remember story elements"
    #[serde(default)]
    pub memory_policy: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// 新建档案的输入，`name` 必填
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub name: String,
    pub system_prompt: Option<String>,
    pub personality: Option<String>,
    pub directives: Option<String>,
    pub memory_policy: Option<String>,
}

impl ProfileDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn into_profile(self) -> Result<DirectiveProfile> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(StoreError::Invalid(
                "name is required and must be a non-empty string".to_string(),
            ));
        }
        let now = now_millis();
        Ok(DirectiveProfile {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            system_prompt: trimmed_or_empty(self.system_prompt),
            personality: trimmed_or_empty(self.personality),
            directives: trimmed_or_empty(self.directives),
            memory_policy: trimmed_or_empty(self.memory_policy),
            created_at: now,
            updated_at: now,
        })
    }
}

/// 部分更新，只覆盖给出的字段（去除首尾空白）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub personality: Option<String>,
    pub directives: Option<String>,
    pub memory_policy: Option<String>,
}

impl ProfilePatch {
    fn apply_to(self, profile: &mut DirectiveProfile) {
        let fields = [
            (self.name, &mut profile.name),
            (self.system_prompt, &mut profile.system_prompt),
            (self.personality, &mut profile.personality),
            (self.directives, &mut profile.directives),
            (self.memory_policy, &mut profile.memory_policy),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value.trim().to_string();
            }
        }
        profile.updated_at = now_millis();
    }
}

/// 内置预设
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePreset {
    pub name: &'static str,
    pub system_prompt: &'static str,
    pub personality: &'static str,
    pub directives: &'static str,
    pub memory_policy: &'static str,
}

pub fn builtin_presets() -> Vec<ProfilePreset> {
    vec![
        ProfilePreset {
            name: "Professional Assistant",
            system_prompt: "You are a professional assistant focused on providing accurate, helpful, and efficient responses.",
            personality: "Professional, courteous, and detail-oriented",
            directives: "- Be clear and concise\n- Provide sources when relevant\n- Ask clarifying questions when needed",
            memory_policy: "Remember user preferences and previous context",
        },
        ProfilePreset {
            name: "Creative Writer",
            system_prompt: "You are a creative writing assistant that helps with storytelling, creative content, and imaginative ideas.",
            personality: "Creative, imaginative, and encouraging",
            directives: "- Embrace creativity and unique ideas\n- Help develop narratives\n- Provide constructive feedback",
            memory_policy: "Remember story elements, characters, and plot points",
        },
        ProfilePreset {
            name: "Technical Expert",
            system_prompt: "You are a technical expert specializing in providing detailed technical explanations and solutions.",
            personality: "Precise, analytical, and knowledgeable",
            directives: "- Provide detailed technical explanations\n- Include code examples when relevant\n- Focus on best practices",
            memory_policy: "Remember technical context, stack preferences, and coding patterns",
        },
        ProfilePreset {
            name: "Educational Tutor",
            system_prompt: "You are an educational tutor focused on helping students learn and understand concepts.",
            personality: "Patient, encouraging, and supportive",
            directives: "- Break down complex topics\n- Use examples and analogies\n- Encourage questions and exploration",
            memory_policy: "Remember learning goals, progress, and areas of difficulty",
        },
    ]
}

// ── ProfileStore ──────────────────────────────────────────────────────────────

pub struct ProfileStore {
    profiles: JsonStore<Vec<DirectiveProfile>>,
}

impl ProfileStore {
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        Ok(Self {
            profiles: JsonStore::open(dir, PROFILES_FILE, options)?,
        })
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<DirectiveProfile>> {
        Ok(self.profiles.get(user_id).await?.unwrap_or_default())
    }

    pub async fn get(&self, user_id: &str, profile_id: &str) -> Result<Option<DirectiveProfile>> {
        self.profiles
            .read(|map| {
                map.get(user_id)
                    .and_then(|profiles| profiles.iter().find(|p| p.id == profile_id))
                    .cloned()
            })
            .await
    }

    pub async fn create(&self, user_id: &str, draft: ProfileDraft) -> Result<DirectiveProfile> {
        let profile = draft.into_profile()?;
        let created = profile.clone();
        self.profiles
            .update(|map| {
                map.entry(user_id.to_string()).or_default().push(profile);
                Commit::Save(())
            })
            .await?;
        info!(user_id = %user_id, profile_id = %created.id, name = %created.name, "✨ 档案已创建");
        Ok(created)
    }

    /// 档案不存在时返回 `None`；`id` 与 `createdAt` 不可修改
    pub async fn update(
        &self,
        user_id: &str,
        profile_id: &str,
        patch: ProfilePatch,
    ) -> Result<Option<DirectiveProfile>> {
        self.profiles
            .update(|map| {
                let Some(profile) = map
                    .get_mut(user_id)
                    .and_then(|profiles| profiles.iter_mut().find(|p| p.id == profile_id))
                else {
                    return Commit::Skip(None);
                };
                patch.apply_to(profile);
                Commit::Save(Some(profile.clone()))
            })
            .await
    }

    pub async fn delete(&self, user_id: &str, profile_id: &str) -> Result<bool> {
        let deleted = self
            .profiles
            .update(|map| {
                let Some(profiles) = map.get_mut(user_id) else {
                    return Commit::Skip(false);
                };
                let before = profiles.len();
                profiles.retain(|p| p.id != profile_id);
                if profiles.len() == before {
                    Commit::Skip(false)
                } else {
                    Commit::Save(true)
                }
            })
            .await?;
        if deleted {
            info!(user_id = %user_id, profile_id = %profile_id, "🗑️ 档案已删除");
        }
        Ok(deleted)
    }
}

fn trimmed_or_empty(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}
