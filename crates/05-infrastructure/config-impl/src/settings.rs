//! 动态配置运行时自身的启动设置
//!
//! 设置来源依次为：内置默认值、可选配置文件、`ADSP_DYNCFG_` 前缀的环境变量。
//! 嵌套字段在环境变量中用 `__` 分隔，例如 `ADSP_DYNCFG_POLLING__INTERVAL_MS=5000`。

use infrastructure_common::{ConfigError, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "ADSP_DYNCFG";

/// 轮询设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// 两次轮询之间的间隔（毫秒）
    pub interval_ms: u64,
    /// 首次轮询前的延迟（毫秒），仅在不做同步首次轮询时生效
    pub initial_delay_ms: u64,
    /// 启动时是否先同步完成一次轮询
    pub sync_initial_poll: bool,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            initial_delay_ms: 0,
            sync_initial_poll: true,
        }
    }
}

impl PollingSettings {
    /// 以指定间隔创建
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    /// 轮询间隔
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// 首次调度前的延迟
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

/// 动态配置运行时设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicConfigSettings {
    /// 根组合配置名称
    pub root_name: String,
    /// 轮询设置
    pub polling: PollingSettings,
    /// 日志设置
    pub logging: LoggingConfig,
}

impl Default for DynamicConfigSettings {
    fn default() -> Self {
        Self {
            root_name: "root".to_string(),
            polling: PollingSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DynamicConfigSettings {
    /// 从可选配置文件与环境变量加载设置
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("加载动态配置设置文件: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                error!("动态配置设置构建失败: {}", e);
                ConfigError::ParseError {
                    source: Box::new(e),
                }
            })?;

        settings.try_deserialize().map_err(|e| {
            error!("动态配置设置绑定失败: {}", e);
            ConfigError::ParseError {
                source: Box::new(e),
            }
        })
    }

    /// 从 TOML 文本解析设置
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })
    }
}
