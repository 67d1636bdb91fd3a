//! 配置变更事件监听接口

use crate::config::Config;
use infrastructure_common::ConfigError;

/// 配置事件监听器 trait
///
/// 由配置视图在快照替换、分层增删或拉取失败时回调。
/// 回调在触发变更的线程上同步执行，实现方应尽快返回。
pub trait ConfigListener: Send + Sync {
    /// 配置层被加入组合配置
    fn on_config_added(&self, config: &dyn Config) {
        let _ = config;
    }

    /// 配置层被移出组合配置
    fn on_config_removed(&self, config: &dyn Config) {
        let _ = config;
    }

    /// 配置快照已整体替换
    fn on_config_updated(&self, config: &dyn Config);

    /// 配置源拉取失败，原快照保持不变
    fn on_error(&self, error: &ConfigError, config: &dyn Config) {
        let _ = (error, config);
    }

    /// 获取监听器名称
    fn name(&self) -> &str {
        "anonymous"
    }
}
