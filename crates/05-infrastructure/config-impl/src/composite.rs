//! 分层组合配置
//!
//! 按优先级组合多个配置层，读取时取第一个包含该键的层。层列表是写时复制的
//! 不可变快照：读取无锁，增删层由互斥锁串行化后整体替换。

use crate::diagnostics::LayerDump;
use crate::layer::Layer;
use crate::listener_list::ConfigListenerList;
use arc_swap::ArcSwap;
use config_abstractions::{Config, ConfigListener};
use infrastructure_common::ConfigError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

struct LayerEntry {
    layer: Layer,
    insertion: u64,
    config: Arc<dyn Config>,
}

impl LayerEntry {
    /// 排序键：优先级升序，同级按加入顺序，反转层按加入顺序倒序
    fn precedence(&self) -> (i32, i64) {
        let insertion = self.insertion as i64;
        let tie = if self.layer.is_reversed() {
            -insertion
        } else {
            insertion
        };
        (self.layer.order(), tie)
    }
}

/// 分层组合配置
pub struct CompositeConfig {
    name: String,
    layers: ArcSwap<Vec<Arc<LayerEntry>>>,
    write_lock: Mutex<u64>,
    listeners: ConfigListenerList,
    forwarder: Arc<dyn ConfigListener>,
}

impl CompositeConfig {
    /// 创建空的组合配置
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|weak: &Weak<Self>| Self {
            name,
            layers: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(0),
            listeners: ConfigListenerList::new(),
            forwarder: Arc::new(LayerForwarder {
                composite: weak.clone(),
            }),
        })
    }

    /// 加入配置层
    ///
    /// 以配置名称识别层，同名配置不能重复加入。
    pub fn add_layer(&self, config: Arc<dyn Config>, layer: Layer) -> Result<(), ConfigError> {
        {
            let mut next_insertion = self.write_lock.lock();
            let current = self.layers.load_full();
            if current.iter().any(|e| e.config.name() == config.name()) {
                warn!("配置层已存在: {}", config.name());
                return Err(ConfigError::DuplicateLayer {
                    name: config.name().to_string(),
                });
            }

            config.add_listener(self.forwarder.clone());

            let entry = Arc::new(LayerEntry {
                layer,
                insertion: *next_insertion,
                config: config.clone(),
            });
            *next_insertion += 1;

            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry);
            next.sort_by_key(|e| e.precedence());
            self.layers.store(Arc::new(next));
        }

        info!("组合配置 {} 加入配置层: {}", self.name, config.name());
        self.listeners.notify_added(config.as_ref());
        Ok(())
    }

    /// 移除配置层，返回被移除的配置
    pub fn remove_layer(&self, name: &str) -> Result<Arc<dyn Config>, ConfigError> {
        let removed = {
            let _guard = self.write_lock.lock();
            let current = self.layers.load_full();
            let Some(position) = current.iter().position(|e| e.config.name() == name) else {
                warn!("配置层不存在: {}", name);
                return Err(ConfigError::LayerNotFound {
                    name: name.to_string(),
                });
            };

            let mut next = Vec::clone(&current);
            let removed = next.remove(position);
            self.layers.store(Arc::new(next));
            removed.config.clone()
        };

        removed.remove_listener(&self.forwarder);
        info!("组合配置 {} 移除配置层: {}", self.name, name);
        self.listeners.notify_removed(removed.as_ref());
        Ok(removed)
    }

    /// 按优先级从高到低返回层内配置名称
    pub fn layer_names(&self) -> Vec<String> {
        self.layers
            .load()
            .iter()
            .map(|e| e.config.name().to_string())
            .collect()
    }

    /// 按名称查找层内配置
    pub fn get_layer(&self, name: &str) -> Option<Arc<dyn Config>> {
        self.layers
            .load()
            .iter()
            .find(|e| e.config.name() == name)
            .map(|e| e.config.clone())
    }

    /// 层数量
    pub fn layer_count(&self) -> usize {
        self.layers.load().len()
    }

    /// 导出层诊断信息
    pub fn describe_layers(&self) -> Vec<LayerDump> {
        self.layers
            .load()
            .iter()
            .map(|e| LayerDump {
                config: e.config.name().to_string(),
                layer: e.layer.name().to_string(),
                order: e.layer.order(),
                reversed: e.layer.is_reversed(),
                key_count: e.config.size(),
            })
            .collect()
    }
}

impl Config for CompositeConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_raw_property(&self, key: &str) -> Option<Value> {
        self.layers
            .load()
            .iter()
            .find_map(|e| e.config.get_raw_property(key))
    }

    fn contains_key(&self, key: &str) -> bool {
        self.layers.load().iter().any(|e| e.config.contains_key(key))
    }

    fn keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for entry in self.layers.load().iter() {
            for key in entry.config.keys() {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    fn is_empty(&self) -> bool {
        self.layers.load().iter().all(|e| e.config.is_empty())
    }

    fn add_listener(&self, listener: Arc<dyn ConfigListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn ConfigListener>) {
        self.listeners.remove(listener);
    }
}

impl Drop for CompositeConfig {
    fn drop(&mut self) {
        for entry in self.layers.load().iter() {
            entry.config.remove_listener(&self.forwarder);
        }
    }
}

impl fmt::Debug for CompositeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeConfig")
            .field("name", &self.name)
            .field("layers", &self.layer_names())
            .field("listeners_count", &self.listeners.len())
            .finish()
    }
}

/// 将层内配置的变更转发为组合配置自身的变更
struct LayerForwarder {
    composite: Weak<CompositeConfig>,
}

impl LayerForwarder {
    fn forward_update(&self, source: &dyn Config) {
        if let Some(composite) = self.composite.upgrade() {
            debug!("组合配置 {} 转发配置层变更: {}", composite.name, source.name());
            composite.listeners.notify_updated(composite.as_ref());
        }
    }
}

impl ConfigListener for LayerForwarder {
    fn on_config_added(&self, config: &dyn Config) {
        self.forward_update(config);
    }

    fn on_config_removed(&self, config: &dyn Config) {
        self.forward_update(config);
    }

    fn on_config_updated(&self, config: &dyn Config) {
        self.forward_update(config);
    }

    fn on_error(&self, error: &ConfigError, _config: &dyn Config) {
        if let Some(composite) = self.composite.upgrade() {
            composite.listeners.notify_error(error, composite.as_ref());
        }
    }

    fn name(&self) -> &str {
        "CompositeLayerForwarder"
    }
}
