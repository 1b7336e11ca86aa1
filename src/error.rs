use std::fmt;
use std::path::PathBuf;

/// 存储层的统一错误类型
///
/// "记录不存在" 不是错误：store 以 `Option` / `bool` / 空 `Vec` 表达缺失，
/// [`StoreError::NotFound`] 仅供 CLI 等外层把缺失映射为失败退出。
#[derive(Debug)]
pub enum StoreError {
    /// 文件系统操作失败（写临时文件、rename、读取等）
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    /// 序列化 / 反序列化失败
    Serialization(String),
    /// 存储文件损坏（仅在 `CorruptPolicy::Fail` 下返回）
    Corrupt { path: PathBuf, message: String },
    /// 外层请求的记录不存在
    NotFound(String),
    /// 输入不合法（如档案名为空）
    Invalid(String),
    /// 配置错误
    Config(ConfigError),
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
}

impl StoreError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// 是否为 I/O 类失败（与 "不存在" 区分开）
    pub fn is_io(&self) -> bool {
        matches!(self, StoreError::Io { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { op, path, source } => {
                write!(f, "IO error during {} on {}: {}", op, path.display(), source)
            }
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StoreError::Corrupt { path, message } => {
                write!(f, "Corrupt store file {}: {}", path.display(), message)
            }
            StoreError::NotFound(what) => write!(f, "Not found: {}", what),
            StoreError::Invalid(msg) => write!(f, "Invalid input: {}", msg),
            StoreError::Config(e) => write!(f, "Config Error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(err: serde_yaml::Error) -> Self {
        StoreError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<ConfigError> for StoreError {
    fn from(err: ConfigError) -> Self {
        StoreError::Config(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
