//! 存储配置加载
//!
//! 优先级从低到高：内置默认值 → YAML 文件 → 环境变量。
//! `.env` 由 `convstore` 入口在初始化日志之前读取一次，库本身不读。
//!
//! ```text
//! CONVERSATION_STORE_DATA_DIR=./data
//! DIRECTIVE_STORE_PATH=./data/directives
//! MEMORY_STORE_PATH=./data/memory
//! PROFILE_STORE_PATH=./data/profiles
//! CONVERSATION_STORE_CORRUPT_POLICY=reset      # reset | fail
//! CONVERSATION_STORE_SERIALIZE_WRITES=true
//! ```
//!
//! YAML 字段与 [`StoreConfig`] 一致（snake_case）。

use crate::error::{ConfigError, Result};
use crate::store::{CorruptPolicy, StoreOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "CONVERSATION_STORE_DATA_DIR";
pub const ENV_DIRECTIVE_DIR: &str = "DIRECTIVE_STORE_PATH";
pub const ENV_MEMORY_DIR: &str = "MEMORY_STORE_PATH";
pub const ENV_PROFILE_DIR: &str = "PROFILE_STORE_PATH";
pub const ENV_CORRUPT_POLICY: &str = "CONVERSATION_STORE_CORRUPT_POLICY";
pub const ENV_SERIALIZE_WRITES: &str = "CONVERSATION_STORE_SERIALIZE_WRITES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 各 store 目录的公共父目录
    pub data_dir: PathBuf,
    /// 未设置时为 `<data_dir>/directives`
    pub directive_dir: Option<PathBuf>,
    /// 未设置时为 `<data_dir>/memory`
    pub memory_dir: Option<PathBuf>,
    /// 未设置时为 `<data_dir>/profiles`
    pub profile_dir: Option<PathBuf>,
    pub corrupt_policy: CorruptPolicy,
    pub serialize_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            directive_dir: None,
            memory_dir: None,
            profile_dir: None,
            corrupt_policy: CorruptPolicy::Reset,
            serialize_writes: true,
        }
    }
}

impl StoreConfig {
    /// 默认值 + 可选 YAML 文件 + 进程环境
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let config: StoreConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// 以 `lookup` 读取环境变量覆盖当前配置
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_DIRECTIVE_DIR) {
            self.directive_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup(ENV_MEMORY_DIR) {
            self.memory_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup(ENV_PROFILE_DIR) {
            self.profile_dir = Some(PathBuf::from(dir));
        }
        if let Some(policy) = lookup(ENV_CORRUPT_POLICY) {
            self.corrupt_policy = policy
                .parse::<CorruptPolicy>()
                .map_err(|message| ConfigError::InvalidValue {
                    field: ENV_CORRUPT_POLICY.to_string(),
                    message,
                })?;
        }
        if let Some(flag) = lookup(ENV_SERIALIZE_WRITES) {
            self.serialize_writes = parse_bool(&flag).ok_or_else(|| ConfigError::InvalidValue {
                field: ENV_SERIALIZE_WRITES.to_string(),
                message: format!("expected true|false, got '{flag}'"),
            })?;
        }
        Ok(self)
    }

    /// 覆盖公共父目录，同时清掉各 store 的单独设置
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self.directive_dir = None;
        self.memory_dir = None;
        self.profile_dir = None;
        self
    }

    pub fn directive_dir(&self) -> PathBuf {
        self.directive_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("directives"))
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.memory_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("memory"))
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.profile_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("profiles"))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            corrupt_policy: self.corrupt_policy,
            serialize_writes: self.serialize_writes,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_layout() {
        let config = StoreConfig::default();
        assert_eq!(config.directive_dir(), PathBuf::from("data/directives"));
        assert_eq!(config.memory_dir(), PathBuf::from("data/memory"));
        assert_eq!(config.profile_dir(), PathBuf::from("data/profiles"));
        assert_eq!(config.store_options(), StoreOptions::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = StoreConfig::default()
            .with_env(env(&[
                (ENV_DATA_DIR, "/srv/chat"),
                (ENV_DIRECTIVE_DIR, "/custom/directives"),
                (ENV_CORRUPT_POLICY, "FAIL"),
                (ENV_SERIALIZE_WRITES, "off"),
            ]))
            .unwrap();
        assert_eq!(config.directive_dir(), PathBuf::from("/custom/directives"));
        assert_eq!(config.memory_dir(), PathBuf::from("/srv/chat/memory"));
        assert_eq!(config.corrupt_policy, CorruptPolicy::Fail);
        assert!(!config.serialize_writes);
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let err = StoreConfig::default()
            .with_env(env(&[(ENV_SERIALIZE_WRITES, "maybe")]))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_yaml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.yaml");
        std::fs::write(
            &path,
            "data_dir: /var/lib/convstore\nmemory_dir: /fast/memory\ncorrupt_policy: fail\n",
        )
        .unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.directive_dir(), PathBuf::from("/var/lib/convstore/directives"));
        assert_eq!(config.memory_dir(), PathBuf::from("/fast/memory"));
        assert_eq!(config.corrupt_policy, CorruptPolicy::Fail);
        assert!(config.serialize_writes);
    }

    #[test]
    fn test_missing_yaml_file() {
        let err = StoreConfig::from_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, StoreError::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_with_data_dir_resets_overrides() {
        let config = StoreConfig {
            memory_dir: Some(PathBuf::from("/elsewhere")),
            ..StoreConfig::default()
        }
        .with_data_dir("/tmp/x");
        assert_eq!(config.memory_dir(), PathBuf::from("/tmp/x/memory"));
    }
}
