//! 诊断信息导出

use crate::polling::PollStatus;
use chrono::{DateTime, Utc};
use infrastructure_common::ConfigError;
use serde::Serialize;

/// 单个缓存条目
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryDump {
    pub key: String,
    pub type_name: String,
    /// 最近一次解析时的全局版本号
    pub stamp: Option<u64>,
    /// 戳记落后于当前版本，下一次读取时重新解析
    pub stale: bool,
    pub has_value: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// 属性缓存
#[derive(Debug, Clone, Serialize)]
pub struct PropertyCacheDump {
    pub version: u64,
    pub listener_count: usize,
    pub entries: Vec<CacheEntryDump>,
}

/// 配置层，按优先级从高到低排列
#[derive(Debug, Clone, Serialize)]
pub struct LayerDump {
    pub config: String,
    pub layer: String,
    pub order: i32,
    pub reversed: bool,
    pub key_count: usize,
}

/// 轮询配置
#[derive(Debug, Clone, Serialize)]
pub struct PollingDump {
    pub name: String,
    pub running: bool,
    pub status: PollStatus,
}

/// 完整诊断快照
#[derive(Debug, Clone, Serialize)]
pub struct ConfigDump {
    pub generated_at: DateTime<Utc>,
    pub root: String,
    pub layers: Vec<LayerDump>,
    pub polling: Vec<PollingDump>,
    pub cache: PropertyCacheDump,
}

impl ConfigDump {
    /// 序列化为格式化 JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::from)
    }
}
