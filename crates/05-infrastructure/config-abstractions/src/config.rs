//! 配置视图抽象接口

use crate::events::ConfigListener;
use serde_json::Value;
use std::sync::Arc;

/// 配置视图 trait
///
/// 只读的键空间视图。单个实例的键值映射只允许通过整体快照替换来变更，
/// 读取方永远不会观察到替换到一半的状态。
pub trait Config: Send + Sync {
    /// 配置名称，仅用于诊断与分层管理
    fn name(&self) -> &str;

    /// 获取原始配置值
    fn get_raw_property(&self, key: &str) -> Option<Value>;

    /// 检查配置键是否存在
    fn contains_key(&self, key: &str) -> bool {
        self.get_raw_property(key).is_some()
    }

    /// 获取所有配置键
    fn keys(&self) -> Vec<String>;

    /// 是否为空
    fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// 配置项数量
    fn size(&self) -> usize {
        self.keys().len()
    }

    /// 注册配置变更监听器
    fn add_listener(&self, listener: Arc<dyn ConfigListener>);

    /// 移除配置变更监听器
    fn remove_listener(&self, listener: &Arc<dyn ConfigListener>);
}

/// 配置视图的便捷访问方法
pub trait ConfigExt: Config {
    /// 以字符串形式读取配置值
    fn get_string(&self, key: &str) -> Option<String> {
        self.get_raw_property(key).map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// 以字符串形式读取配置值，缺失时返回默认值
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    /// 获取指定前缀下的所有配置键
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect()
    }
}

impl<C: Config + ?Sized> ConfigExt for C {}

/// 判断两个监听器是否为同一实例
pub fn same_listener(a: &Arc<dyn ConfigListener>, b: &Arc<dyn ConfigListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}
