//! 基于内存映射的配置实现

use crate::listener_list::ConfigListenerList;
use arc_swap::ArcSwap;
use config_abstractions::{Config, ConfigListener, Snapshot};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// 静态内存配置
///
/// 构造后内容不再变化，因此不会触发任何监听器。
#[derive(Debug, Clone)]
pub struct MapConfig {
    name: String,
    data: Snapshot,
}

impl MapConfig {
    /// 创建空的静态配置
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Snapshot::new(),
        }
    }

    /// 从已有映射创建
    pub fn from_map(name: impl Into<String>, data: Snapshot) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// 添加配置项
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

impl Config for MapConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_raw_property(&self, key: &str) -> Option<Value> {
        self.data.get(key).cloned()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn add_listener(&self, _listener: Arc<dyn ConfigListener>) {}

    fn remove_listener(&self, _listener: &Arc<dyn ConfigListener>) {}
}

/// 可写运行时配置
///
/// 每次写入都复制当前快照、修改后整体替换，然后通知监听器。
#[derive(Debug)]
pub struct SettableConfig {
    name: String,
    data: ArcSwap<Snapshot>,
    listeners: ConfigListenerList,
}

impl SettableConfig {
    /// 创建空的可写配置
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: ArcSwap::from_pointee(Snapshot::new()),
            listeners: ConfigListenerList::new(),
        }
    }

    /// 设置单个配置项
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        debug!("设置运行时配置: {} = {}", key, value);
        self.data.rcu(|current| {
            let mut next = Snapshot::clone(current);
            next.insert(key.clone(), value.clone());
            next
        });
        self.listeners.notify_updated(self);
    }

    /// 批量设置配置项，只触发一次通知
    pub fn set_properties<I, K, V>(&self, properties: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let updates: Vec<(String, Value)> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if updates.is_empty() {
            return;
        }
        debug!("批量设置运行时配置: {} 项", updates.len());
        self.data.rcu(|current| {
            let mut next = Snapshot::clone(current);
            next.extend(updates.iter().cloned());
            next
        });
        self.listeners.notify_updated(self);
    }

    /// 清除配置项，返回被清除的旧值
    pub fn clear_property(&self, key: &str) -> Option<Value> {
        let previous = self.data.load().get(key).cloned()?;
        debug!("清除运行时配置: {}", key);
        self.data.rcu(|current| {
            let mut next = Snapshot::clone(current);
            next.remove(key);
            next
        });
        self.listeners.notify_updated(self);
        Some(previous)
    }
}

impl Config for SettableConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_raw_property(&self, key: &str) -> Option<Value> {
        self.data.load().get(key).cloned()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.data.load().contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.data.load().keys().cloned().collect()
    }

    fn is_empty(&self) -> bool {
        self.data.load().is_empty()
    }

    fn size(&self) -> usize {
        self.data.load().len()
    }

    fn add_listener(&self, listener: Arc<dyn ConfigListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn ConfigListener>) {
        self.listeners.remove(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_abstractions::ConfigExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        updates: AtomicUsize,
    }

    impl ConfigListener for CountingListener {
        fn on_config_updated(&self, _config: &dyn Config) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_map_config_reads() {
        let config = MapConfig::new("defaults")
            .with_property("server.port", "8080")
            .with_property("server.enabled", true);

        assert_eq!(config.name(), "defaults");
        assert_eq!(config.size(), 2);
        assert!(config.contains_key("server.port"));
        assert_eq!(config.get_string("server.port"), Some("8080".to_string()));
        assert_eq!(config.get_string("server.enabled"), Some("true".to_string()));
        assert_eq!(config.get_string_or("missing", "fallback"), "fallback");
        assert_eq!(config.keys_with_prefix("server.").len(), 2);
    }

    #[test]
    fn test_settable_config_notifies_on_each_write() {
        let config = SettableConfig::new("runtime");
        let listener = Arc::new(CountingListener::default());
        config.add_listener(listener.clone());

        config.set_property("a", "1");
        config.set_properties([("b", "2"), ("c", "3")]);
        assert_eq!(config.size(), 3);
        assert_eq!(listener.updates.load(Ordering::SeqCst), 2);

        assert_eq!(config.clear_property("a"), Some(Value::from("1")));
        assert_eq!(config.clear_property("a"), None);
        assert!(!config.contains_key("a"));
        assert_eq!(listener.updates.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_settable_config_empty_batch_is_silent() {
        let config = SettableConfig::new("runtime");
        let listener = Arc::new(CountingListener::default());
        config.add_listener(listener.clone());

        config.set_properties(Vec::<(String, String)>::new());
        assert_eq!(listener.updates.load(Ordering::SeqCst), 0);
        assert!(config.is_empty());
    }
}
