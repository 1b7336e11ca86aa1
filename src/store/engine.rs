//! 通用 JSON 文件 KV 引擎
//!
//! 一个 store 对应一个 JSON 文档，`key`（通常是 conversation ID）→ 任意可序列化记录。
//!
//! 写入流程：序列化 → 写 `<file>.tmp` → `fsync` → `rename` 覆盖正式文件 → 替换缓存。
//! 任意时刻打开正式文件的读者只会看到完整的旧内容或完整的新内容。
//!
//! 读取流程：命中缓存直接返回副本；否则读盘，文件不存在视为空 store，
//! 文件损坏按 [`CorruptPolicy`] 处理。
//!
//! ## 并发语义
//!
//! - [`JsonStore::load`] / [`JsonStore::save`] 之间不互斥：调用方自行 load → 修改 → save 时，
//!   后完成的 save 覆盖整个 map（last-save-wins），与其间其它 key 的修改无关。
//! - [`JsonStore::update`] 在 `serialize_writes` 开启时用进程内 mutex 串行化整个
//!   load-mutate-save 周期，同一个 store 对象上的并发写不再丢失。
//! - 缓存只属于当前对象，多个对象 / 多个进程共享同一目录时没有失效通知，
//!   彼此之间仍是整图 last-save-wins。
//! - 临时文件名固定为 `<file>.tmp`，`io_lock` 只在进程内生效。多个进程同时保存
//!   同一个 store 时可能截断彼此的临时文件，rename 也可能发布对方尚未写完的内容。
//!   跨进程写入需要外部协调。

use crate::error::{Result, StoreError};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// 整个 store 的内存表示，保持 key 首次写入的顺序（落盘顺序一致）
pub type StoreMap<R> = IndexMap<String, R>;

// ── 选项 ──────────────────────────────────────────────────────────────────────

/// 存储文件无法解析时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptPolicy {
    /// 记录日志、把坏文件复制为 `<file>.corrupt`，按空 store 继续
    #[default]
    Reset,
    /// 直接返回错误
    Fail,
}

impl std::str::FromStr for CorruptPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(CorruptPolicy::Reset),
            "fail" => Ok(CorruptPolicy::Fail),
            other => Err(format!("unknown corrupt policy '{other}', expected reset|fail")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub corrupt_policy: CorruptPolicy,
    /// 串行化同一对象上的 `update` 周期
    pub serialize_writes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            corrupt_policy: CorruptPolicy::Reset,
            serialize_writes: true,
        }
    }
}

/// `update` 闭包的结果：是否需要落盘
pub enum Commit<T> {
    /// map 已修改，需要持久化
    Save(T),
    /// 未修改，直接返回
    Skip(T),
}

// ── JsonStore ─────────────────────────────────────────────────────────────────

pub struct JsonStore<R> {
    path: PathBuf,
    temp_path: PathBuf,
    options: StoreOptions,
    /// 最近一次成功读盘或落盘的内容
    cache: RwLock<Option<StoreMap<R>>>,
    /// 保护临时文件 + rename + 缓存替换
    io_lock: Mutex<()>,
    update_lock: Mutex<()>,
}

impl<R> JsonStore<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// 打开 `dir/file_name`，自动创建目录；文件本身在首次写入时才生成
    pub fn open(dir: impl AsRef<Path>, file_name: &str, options: StoreOptions) -> Result<Self> {
        let dir = expand_tilde(dir.as_ref());
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io("create dir", &dir, e))?;
        let path = dir.join(file_name);
        let temp_path = dir.join(format!("{file_name}.tmp"));
        info!(
            path = %path.display(),
            corrupt_policy = ?options.corrupt_policy,
            serialize_writes = options.serialize_writes,
            "🗄️ JsonStore 初始化"
        );
        Ok(Self {
            path,
            temp_path,
            options,
            cache: RwLock::new(None),
            io_lock: Mutex::new(()),
            update_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// 返回整个 map 的独立副本
    pub async fn load(&self) -> Result<StoreMap<R>> {
        if let Some(map) = self.cache.read().await.as_ref() {
            return Ok(map.clone());
        }
        let map = self.read_from_disk().await?;
        let mut cache = self.cache.write().await;
        // 读盘期间可能已有 save 填充了更新的缓存
        Ok(cache.get_or_insert(map).clone())
    }

    /// 在缓存上执行只读闭包，避免复制整个 map
    pub async fn read<T>(&self, f: impl FnOnce(&StoreMap<R>) -> T) -> Result<T> {
        {
            let cache = self.cache.read().await;
            if let Some(map) = cache.as_ref() {
                return Ok(f(map));
            }
        }
        let map = self.load().await?;
        Ok(f(&map))
    }

    /// 原子地把 `map` 写盘并替换缓存；失败时尽力清理临时文件后返回原始错误
    pub async fn save(&self, map: StoreMap<R>) -> Result<()> {
        let json = serde_json::to_string_pretty(&map)?;
        let _io = self.io_lock.lock().await;
        if let Err(err) = self.write_atomic(json.as_bytes()).await {
            error!(path = %self.path.display(), error = %err, "💥 store 持久化失败");
            self.discard_temp().await;
            return Err(err);
        }
        let records = map.len();
        *self.cache.write().await = Some(map);
        debug!(path = %self.path.display(), records, "💾 store 已持久化");
        Ok(())
    }

    /// load → `f` → 按需 save
    pub async fn update<T>(&self, f: impl FnOnce(&mut StoreMap<R>) -> Commit<T>) -> Result<T> {
        let _serial = if self.options.serialize_writes {
            Some(self.update_lock.lock().await)
        } else {
            None
        };
        let mut map = self.load().await?;
        match f(&mut map) {
            Commit::Save(value) => {
                self.save(map).await?;
                Ok(value)
            }
            Commit::Skip(value) => Ok(value),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<R>> {
        self.read(|map| map.get(key).cloned()).await
    }

    pub async fn set(&self, key: &str, record: R) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), record);
            Commit::Save(())
        })
        .await
    }

    /// 删除 key；不存在时返回 `false` 且不写盘
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.update(|map| {
            if map.shift_remove(key).is_some() {
                Commit::Save(true)
            } else {
                Commit::Skip(false)
            }
        })
        .await
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        self.read(|map| map.keys().cloned().collect()).await
    }

    /// 丢弃缓存，下一次读取强制读盘
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }

    // ── 私有 ──────────────────────────────────────────────────────────────────

    async fn read_from_disk(&self) -> Result<StoreMap<R>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store 文件不存在，按空 store 处理");
                return Ok(StoreMap::new());
            }
            Err(e) => return self.recover(StoreError::io("read", &self.path, e)).await,
        };
        match serde_json::from_str::<StoreMap<R>>(&raw) {
            Ok(map) => {
                info!(path = %self.path.display(), records = map.len(), "📂 store 已加载");
                Ok(map)
            }
            Err(e) => {
                self.recover(StoreError::Corrupt {
                    path: self.path.clone(),
                    message: e.to_string(),
                })
                .await
            }
        }
    }

    async fn recover(&self, err: StoreError) -> Result<StoreMap<R>> {
        match self.options.corrupt_policy {
            CorruptPolicy::Fail => {
                error!(path = %self.path.display(), error = %err, "store 文件不可读");
                Err(err)
            }
            CorruptPolicy::Reset => {
                warn!(path = %self.path.display(), error = %err, "store 文件不可读，从空状态开始");
                self.quarantine().await;
                Ok(StoreMap::new())
            }
        }
    }

    /// 在下一次 save 覆盖之前把坏文件留一份
    async fn quarantine(&self) {
        let target = corrupt_path(&self.path);
        match tokio::fs::copy(&self.path, &target).await {
            Ok(_) => warn!(backup = %target.display(), "已备份损坏的 store 文件"),
            Err(e) => error!(backup = %target.display(), error = %e, "备份损坏的 store 文件失败"),
        }
    }

    async fn write_atomic(&self, bytes: &[u8]) -> Result<()> {
        let mut file = tokio::fs::File::create(&self.temp_path)
            .await
            .map_err(|e| StoreError::io("create temp file", &self.temp_path, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StoreError::io("write temp file", &self.temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io("sync temp file", &self.temp_path, e))?;
        drop(file);
        tokio::fs::rename(&self.temp_path, &self.path)
            .await
            .map_err(|e| StoreError::io("rename", &self.path, e))
    }

    async fn discard_temp(&self) {
        match tokio::fs::remove_file(&self.temp_path).await {
            Ok(()) => debug!(path = %self.temp_path.display(), "🧹 已清理临时文件"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!(path = %self.temp_path.display(), error = %e, "清理临时文件失败"),
        }
    }
}

// ── 私有工具函数 ──────────────────────────────────────────────────────────────

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/")
        && let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    {
        return PathBuf::from(home).join(&s[2..]);
    }
    path.to_path_buf()
}
