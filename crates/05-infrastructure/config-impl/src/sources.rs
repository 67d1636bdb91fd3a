//! 配置源实现

use async_trait::async_trait;
use config_abstractions::{Snapshot, SnapshotSource};
use infrastructure_common::ConfigError;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// 内存快照配置源
///
/// 每次拉取返回当前映射的完整副本。可以注入失败，用于演练拉取失败时
/// 保留旧快照的行为。
#[derive(Debug)]
pub struct MapSnapshotSource {
    name: String,
    data: RwLock<Snapshot>,
    failure: RwLock<Option<String>>,
    fetch_count: AtomicU64,
}

impl MapSnapshotSource {
    /// 创建空配置源
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(Snapshot::new()),
            failure: RwLock::new(None),
            fetch_count: AtomicU64::new(0),
        }
    }

    /// 以初始映射创建配置源
    pub fn with_snapshot(name: impl Into<String>, data: Snapshot) -> Self {
        let source = Self::new(name);
        *source.data.write() = data;
        source
    }

    /// 整体替换下一次拉取返回的快照
    pub fn set_snapshot(&self, data: Snapshot) {
        *self.data.write() = data;
    }

    /// 设置单个配置项
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.write().insert(key.into(), value.into());
    }

    /// 移除单个配置项
    pub fn remove_property(&self, key: &str) -> Option<Value> {
        self.data.write().remove(key)
    }

    /// 之后的每次拉取都返回错误，直到调用 [`recover`](Self::recover)
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write() = Some(message.into());
    }

    /// 恢复正常拉取
    pub fn recover(&self) {
        *self.failure.write() = None;
    }

    /// 已执行的拉取次数
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SnapshotSource for MapSnapshotSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, ConfigError> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        if let Some(message) = self.failure.read().clone() {
            return Err(ConfigError::source_fetch_failed(&self.name, message));
        }

        let snapshot = self.data.read().clone();
        debug!("内存配置源 {} 返回 {} 个配置项", self.name, snapshot.len());
        Ok(snapshot)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
