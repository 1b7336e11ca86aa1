//! 命令行入口：对外暴露与 HTTP 路由相同的读写操作，输出 JSON
//!
//! ```text
//! convstore directive set conv-1 --system-prompt "Be terse" --memory-policy manual
//! convstore memory add conv-1 "prefers dark mode"
//! convstore memory update conv-1 mem_1700000000000_ab12cd34e --enabled false
//! convstore profile create --user u1 --name "Reviewer"
//! ```

use crate::context::Stores;
use crate::directive::{Directive, MemoryPolicy, ProfileDraft, ProfilePatch, builtin_presets};
use crate::error::{Result, StoreError};
use crate::memory::MemoryItemPatch;
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "convstore", about = "File-backed directive and memory stores for conversations")]
pub struct Cli {
    /// YAML 配置文件
    #[arg(long, global = true, env = "CONVERSATION_STORE_CONFIG")]
    pub config: Option<PathBuf>,
    /// 覆盖数据目录（忽略各 store 的单独路径）
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Per-conversation system prompt, personality and memory policy
    #[command(subcommand)]
    Directive(DirectiveCommand),
    /// Per-conversation memory items
    #[command(subcommand)]
    Memory(MemoryCommand),
    /// Named directive profiles owned by a user
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Debug, Subcommand)]
pub enum DirectiveCommand {
    /// Print the current directive (null when none is saved)
    Get {
        conversation_id: String,
        /// Print the default directive instead of null
        #[arg(long)]
        or_default: bool,
    },
    /// Replace the directive; the previous one moves into history
    Set {
        conversation_id: String,
        #[arg(long, default_value = "")]
        system_prompt: String,
        #[arg(long)]
        personality: Option<String>,
        #[arg(long)]
        memory_policy: Option<MemoryPolicy>,
    },
    /// Superseded directives, oldest first
    History { conversation_id: String },
    Delete { conversation_id: String },
    /// Distinct directives across all histories
    Presets,
    /// Conversations that have a directive
    Conversations,
}

#[derive(Debug, Subcommand)]
pub enum MemoryCommand {
    List { conversation_id: String },
    Add {
        conversation_id: String,
        content: String,
    },
    Update {
        conversation_id: String,
        item_id: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    Delete {
        conversation_id: String,
        item_id: String,
    },
    /// Enabled items only, in order
    Enabled { conversation_id: String },
    /// Remove every item of a conversation
    Clear { conversation_id: String },
    /// Conversations that have memory items
    Conversations,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    List {
        #[arg(long)]
        user: String,
    },
    Get {
        #[arg(long)]
        user: String,
        id: String,
    },
    Create {
        #[arg(long)]
        user: String,
        #[command(flatten)]
        fields: ProfileFields,
    },
    Update {
        #[arg(long)]
        user: String,
        id: String,
        #[command(flatten)]
        fields: ProfileFields,
    },
    Delete {
        #[arg(long)]
        user: String,
        id: String,
    },
    /// Built-in presets shipped with the binary
    Builtin,
}

#[derive(Debug, Args)]
pub struct ProfileFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub system_prompt: Option<String>,
    #[arg(long)]
    pub personality: Option<String>,
    #[arg(long)]
    pub directives: Option<String>,
    #[arg(long)]
    pub memory_policy: Option<String>,
}

/// 执行命令并返回要打印的 JSON
pub async fn run(command: Command, stores: &Stores) -> Result<Value> {
    match command {
        Command::Directive(cmd) => run_directive(cmd, stores).await,
        Command::Memory(cmd) => run_memory(cmd, stores).await,
        Command::Profile(cmd) => run_profile(cmd, stores).await,
    }
}

async fn run_directive(cmd: DirectiveCommand, stores: &Stores) -> Result<Value> {
    let directives = &stores.directives;
    match cmd {
        DirectiveCommand::Get {
            conversation_id,
            or_default,
        } => {
            let directive = match directives.get_directive(&conversation_id).await? {
                Some(directive) => Some(directive),
                None if or_default => Some(Directive::default_for(&conversation_id)),
                None => None,
            };
            to_json(&directive)
        }
        DirectiveCommand::Set {
            conversation_id,
            system_prompt,
            personality,
            memory_policy,
        } => {
            let saved = directives
                .save_directive(&conversation_id, system_prompt, personality, memory_policy)
                .await?;
            to_json(&saved)
        }
        DirectiveCommand::History { conversation_id } => {
            to_json(&directives.get_directive_history(&conversation_id).await?)
        }
        DirectiveCommand::Delete { conversation_id } => {
            let deleted = directives.delete_directive(&conversation_id).await?;
            Ok(json!({ "deleted": deleted }))
        }
        DirectiveCommand::Presets => to_json(&directives.get_presets().await?),
        DirectiveCommand::Conversations => {
            let ids = directives.list_conversations().await?;
            Ok(json!({ "conversationIds": ids }))
        }
    }
}

async fn run_memory(cmd: MemoryCommand, stores: &Stores) -> Result<Value> {
    let memory = &stores.memory;
    match cmd {
        MemoryCommand::List { conversation_id } => {
            to_json(&memory.get_memory_items(&conversation_id).await?)
        }
        MemoryCommand::Add {
            conversation_id,
            content,
        } => to_json(&memory.add_memory_item(&conversation_id, content).await?),
        MemoryCommand::Update {
            conversation_id,
            item_id,
            content,
            enabled,
        } => {
            let patch = MemoryItemPatch {
                content,
                enabled,
                ..MemoryItemPatch::default()
            };
            let updated = memory
                .update_memory_item(&conversation_id, &item_id, patch)
                .await?
                .ok_or_else(|| {
                    StoreError::NotFound(format!("memory item {item_id} in {conversation_id}"))
                })?;
            to_json(&updated)
        }
        MemoryCommand::Delete {
            conversation_id,
            item_id,
        } => {
            let deleted = memory.delete_memory_item(&conversation_id, &item_id).await?;
            Ok(json!({ "deleted": deleted }))
        }
        MemoryCommand::Enabled { conversation_id } => {
            to_json(&memory.get_enabled_memory_items(&conversation_id).await?)
        }
        MemoryCommand::Clear { conversation_id } => {
            memory.clear_conversation_memory(&conversation_id).await?;
            Ok(json!({ "success": true }))
        }
        MemoryCommand::Conversations => {
            let ids = memory.list_conversations().await?;
            Ok(json!({ "conversationIds": ids }))
        }
    }
}

async fn run_profile(cmd: ProfileCommand, stores: &Stores) -> Result<Value> {
    let profiles = &stores.profiles;
    match cmd {
        ProfileCommand::List { user } => to_json(&profiles.list(&user).await?),
        ProfileCommand::Get { user, id } => {
            let profile = profiles
                .get(&user, &id)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))?;
            to_json(&profile)
        }
        ProfileCommand::Create { user, fields } => {
            let draft = ProfileDraft {
                name: fields.name.unwrap_or_default(),
                system_prompt: fields.system_prompt,
                personality: fields.personality,
                directives: fields.directives,
                memory_policy: fields.memory_policy,
            };
            to_json(&profiles.create(&user, draft).await?)
        }
        ProfileCommand::Update { user, id, fields } => {
            let patch = ProfilePatch {
                name: fields.name,
                system_prompt: fields.system_prompt,
                personality: fields.personality,
                directives: fields.directives,
                memory_policy: fields.memory_policy,
            };
            let updated = profiles
                .update(&user, &id, patch)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))?;
            to_json(&updated)
        }
        ProfileCommand::Delete { user, id } => {
            let deleted = profiles.delete(&user, &id).await?;
            Ok(json!({ "deleted": deleted }))
        }
        ProfileCommand::Builtin => to_json(&builtin_presets()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
