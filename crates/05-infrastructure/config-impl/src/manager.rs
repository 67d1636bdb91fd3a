//! 动态配置管理器实现

use crate::composite::CompositeConfig;
use crate::decoders::DefaultDecoder;
use crate::diagnostics::{ConfigDump, PollingDump};
use crate::layer::{Layer, Layers};
use crate::map_config::SettableConfig;
use crate::polling::{PollOutcome, PollingConfig};
use crate::property::{Property, PropertyFactory};
use crate::scheduler::FixedDelayPollingScheduler;
use crate::settings::DynamicConfigSettings;
use chrono::Utc;
use config_abstractions::{Config, Decoder, PollingScheduler, SnapshotSource};
use dashmap::DashMap;
use infrastructure_common::ConfigError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// 运行时覆盖层的配置名称
pub const RUNTIME_CONFIG_NAME: &str = "runtime";

/// 动态配置管理器
///
/// 组合根配置、运行时覆盖层、属性工厂与各轮询配置源。
/// 由应用显式创建并持有，不提供全局单例。
pub struct DynamicConfigManager {
    settings: DynamicConfigSettings,
    /// 根组合配置
    root: Arc<CompositeConfig>,
    /// 运行时覆盖层
    runtime: Arc<SettableConfig>,
    /// 绑定根配置的属性工厂
    factory: Arc<PropertyFactory>,
    /// 已启动的轮询配置
    polling: DashMap<String, Arc<PollingConfig>>,
}

impl std::fmt::Debug for DynamicConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicConfigManager")
            .field("root", &self.root.name())
            .field("layers", &self.root.layer_names())
            .field("polling_count", &self.polling.len())
            .field("version", &self.factory.version())
            .finish()
    }
}

impl DynamicConfigManager {
    /// 以内置解码器创建管理器
    pub fn new(settings: DynamicConfigSettings) -> Result<Self, ConfigError> {
        Self::with_decoder(settings, Arc::new(DefaultDecoder::new()))
    }

    /// 以自定义解码器创建管理器
    pub fn with_decoder(
        settings: DynamicConfigSettings,
        decoder: Arc<dyn Decoder>,
    ) -> Result<Self, ConfigError> {
        let root = CompositeConfig::new(settings.root_name.clone());
        let runtime = Arc::new(SettableConfig::new(RUNTIME_CONFIG_NAME));
        root.add_layer(runtime.clone(), Layers::RUNTIME)?;
        let factory = PropertyFactory::new(root.clone(), decoder);

        info!("动态配置管理器已创建: {}", settings.root_name);
        Ok(Self {
            settings,
            root,
            runtime,
            factory,
            polling: DashMap::new(),
        })
    }

    /// 管理器设置
    pub fn settings(&self) -> &DynamicConfigSettings {
        &self.settings
    }

    /// 根组合配置
    pub fn config(&self) -> &Arc<CompositeConfig> {
        &self.root
    }

    /// 属性工厂
    pub fn factory(&self) -> &Arc<PropertyFactory> {
        &self.factory
    }

    /// 运行时覆盖层
    pub fn runtime(&self) -> &Arc<SettableConfig> {
        &self.runtime
    }

    /// 加入静态配置层
    pub fn add_layer(&self, config: Arc<dyn Config>, layer: Layer) -> Result<(), ConfigError> {
        self.root.add_layer(config, layer)
    }

    /// 移除配置层，轮询配置层同时停止轮询
    pub fn remove_layer(&self, name: &str) -> Result<Arc<dyn Config>, ConfigError> {
        let removed = self.root.remove_layer(name)?;
        if let Some((_, polling)) = self.polling.remove(name) {
            polling.stop();
        }
        Ok(removed)
    }

    /// 以设置中的固定延迟调度器加入轮询配置源
    pub async fn add_polling_source(
        &self,
        name: &str,
        source: Arc<dyn SnapshotSource>,
        layer: Layer,
    ) -> Result<Arc<PollingConfig>, ConfigError> {
        let scheduler = Arc::new(FixedDelayPollingScheduler::new(
            self.settings.polling.clone(),
        ));
        self.add_polling_source_with(name, source, layer, scheduler)
            .await
    }

    /// 以自定义调度器加入轮询配置源
    ///
    /// 调度器启动后才加入根配置，同步首次轮询的结果在加入时即可见。
    pub async fn add_polling_source_with(
        &self,
        name: &str,
        source: Arc<dyn SnapshotSource>,
        layer: Layer,
        scheduler: Arc<dyn PollingScheduler>,
    ) -> Result<Arc<PollingConfig>, ConfigError> {
        if self.root.get_layer(name).is_some() || self.polling.contains_key(name) {
            warn!("配置层已存在: {}", name);
            return Err(ConfigError::DuplicateLayer {
                name: name.to_string(),
            });
        }

        let config = Arc::new(PollingConfig::new(name, source));
        config.start(scheduler).await?;

        if let Err(error) = self.root.add_layer(config.clone(), layer) {
            config.stop();
            return Err(error);
        }
        self.polling.insert(name.to_string(), config.clone());

        info!("轮询配置源已加入: {}", name);
        Ok(config)
    }

    /// 立即对指定轮询配置执行一次轮询
    pub async fn poll_now(&self, name: &str) -> Result<PollOutcome, ConfigError> {
        let config = self
            .polling
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ConfigError::LayerNotFound {
                name: name.to_string(),
            })?;
        Ok(config.poll().await)
    }

    /// 设置运行时覆盖值
    pub fn set_override(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.runtime.set_property(key, value);
    }

    /// 清除运行时覆盖值
    pub fn clear_override(&self, key: &str) -> Option<Value> {
        self.runtime.clear_property(key)
    }

    /// 获取类型化属性
    ///
    /// # Panics
    ///
    /// 目标类型没有注册解码器时 panic，见 [`PropertyFactory::property`]。
    pub fn property<T>(&self, key: &str) -> Property<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.factory.property(key)
    }

    /// 获取类型化属性，目标类型没有解码器时返回错误
    pub fn try_property<T>(&self, key: &str) -> Result<Property<T>, ConfigError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.factory.try_property(key)
    }

    /// 导出诊断快照
    pub fn dump(&self) -> ConfigDump {
        let mut polling: Vec<PollingDump> = self
            .polling
            .iter()
            .map(|entry| PollingDump {
                name: entry.key().clone(),
                running: entry.value().is_running(),
                status: entry.value().status(),
            })
            .collect();
        polling.sort_by(|a, b| a.name.cmp(&b.name));

        ConfigDump {
            generated_at: Utc::now(),
            root: self.root.name().to_string(),
            layers: self.root.describe_layers(),
            polling,
            cache: self.factory.dump(),
        }
    }

    /// 停止所有轮询，已发布的快照保持可读
    pub fn shutdown(&self) {
        for entry in self.polling.iter() {
            entry.value().stop();
        }
        info!("动态配置管理器已关闭: {}", self.root.name());
    }
}
