//! 进程级 store 集合
//!
//! 进程启动时构造一次，以 `Arc` 传给每个需要的处理器，替代全局单例。

use crate::config::StoreConfig;
use crate::directive::{DirectiveStore, ProfileStore};
use crate::error::Result;
use crate::memory::MemoryStore;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct Stores {
    pub directives: Arc<DirectiveStore>,
    pub memory: Arc<MemoryStore>,
    pub profiles: Arc<ProfileStore>,
}

impl Stores {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let options = config.store_options();
        let stores = Self {
            directives: Arc::new(DirectiveStore::open(config.directive_dir(), options)?),
            memory: Arc::new(MemoryStore::open(config.memory_dir(), options)?),
            profiles: Arc::new(ProfileStore::open(config.profile_dir(), options)?),
        };
        info!(
            directives = %config.directive_dir().display(),
            memory = %config.memory_dir().display(),
            profiles = %config.profile_dir().display(),
            "🚀 stores 已就绪"
        );
        Ok(stores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_bootstraps_all_directories() {
        let tmp = tempdir().unwrap();
        let config = StoreConfig::default().with_data_dir(tmp.path());
        let stores = Stores::open(&config).unwrap();

        assert!(config.directive_dir().is_dir());
        assert!(config.memory_dir().is_dir());
        assert!(config.profile_dir().is_dir());

        // 克隆共享同一组 store
        let handle = stores.clone();
        handle.memory.add_memory_item("c1", "shared").await.unwrap();
        assert_eq!(stores.memory.get_memory_items("c1").await.unwrap().len(), 1);
    }
}
