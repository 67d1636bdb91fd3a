//! 配置源抽象接口

use async_trait::async_trait;
use infrastructure_common::ConfigError;
use serde_json::Value;
use std::collections::HashMap;

/// 配置快照：某一时刻配置源的完整键值集合
pub type Snapshot = HashMap<String, Value>;

/// 配置源 trait
///
/// 每次调用返回完整快照而不是增量，失败时由调用方保留上一次成功的快照。
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// 拉取完整配置快照
    async fn fetch_snapshot(&self) -> Result<Snapshot, ConfigError>;

    /// 获取配置源名称
    fn name(&self) -> &str;
}
