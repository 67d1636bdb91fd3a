//! 配置监听器列表
//!
//! 写少读多的写时复制列表，分发时遍历不可变快照，
//! 因此在回调中增删监听器是安全的。

use arc_swap::ArcSwap;
use config_abstractions::{same_listener, Config, ConfigListener};
use infrastructure_common::ConfigError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// 配置监听器列表
pub struct ConfigListenerList {
    listeners: ArcSwap<Vec<Arc<dyn ConfigListener>>>,
}

impl ConfigListenerList {
    /// 创建空列表
    pub fn new() -> Self {
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// 注册监听器，重复注册同一实例会被忽略
    pub fn add(&self, listener: Arc<dyn ConfigListener>) {
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            if !next.iter().any(|l| same_listener(l, &listener)) {
                next.push(listener.clone());
            }
            next
        });
    }

    /// 移除监听器
    pub fn remove(&self, listener: &Arc<dyn ConfigListener>) {
        self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|l| !same_listener(l, listener))
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    /// 监听器数量
    pub fn len(&self) -> usize {
        self.listeners.load().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.listeners.load().is_empty()
    }

    /// 通知配置层加入
    pub fn notify_added(&self, config: &dyn Config) {
        self.dispatch("on_config_added", |l| l.on_config_added(config));
    }

    /// 通知配置层移除
    pub fn notify_removed(&self, config: &dyn Config) {
        self.dispatch("on_config_removed", |l| l.on_config_removed(config));
    }

    /// 通知配置快照更新
    pub fn notify_updated(&self, config: &dyn Config) {
        self.dispatch("on_config_updated", |l| l.on_config_updated(config));
    }

    /// 通知配置源错误
    pub fn notify_error(&self, error: &ConfigError, config: &dyn Config) {
        self.dispatch("on_error", |l| l.on_error(error, config));
    }

    fn dispatch<F>(&self, event: &str, f: F)
    where
        F: Fn(&dyn ConfigListener),
    {
        let snapshot = self.listeners.load_full();
        for listener in snapshot.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| f(listener.as_ref())));
            if result.is_err() {
                error!("配置监听器 {} 处理 {} 时发生 panic", listener.name(), event);
            }
        }
    }
}

impl Default for ConfigListenerList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigListenerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigListenerList")
            .field("listeners_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_config::MapConfig;
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

    struct PanickingListener;

    impl ConfigListener for PanickingListener {
        fn on_config_updated(&self, _config: &dyn Config) {
            panic!("listener failure");
        }
    }

    #[test]
    fn test_add_is_idempotent_and_remove_by_identity() {
        let list = ConfigListenerList::new();
        let listener: Arc<dyn ConfigListener> = Arc::new(CountingListener::default());

        list.add(listener.clone());
        list.add(listener.clone());
        assert_eq!(list.len(), 1);

        list.remove(&listener);
        assert!(list.is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_stop_dispatch() {
        let list = ConfigListenerList::new();
        let counter = Arc::new(CountingListener::default());
        list.add(Arc::new(PanickingListener));
        list.add(counter.clone());

        let config = MapConfig::new("test");
        list.notify_updated(&config);

        assert_eq!(counter.updates.load(Ordering::SeqCst), 1);
    }
}
