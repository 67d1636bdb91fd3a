//! 类型化属性缓存
//!
//! 每个配置键按请求的目标类型各缓存一份解码结果。所有缓存条目共享一个
//! 全局版本号：配置变更时只需递增版本号，条目在下一次读取时发现自己的
//! 戳记落后才重新解码，不需要逐条失效。

use crate::diagnostics::{CacheEntryDump, PropertyCacheDump};
use crate::registry::{ListenerId, ListenerRegistry, PropertySubscription, Updater};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use config_abstractions::{
    Config, ConfigListener, DecodedValue, Decoder, PropertyListener, TypeTag,
};
use dashmap::DashMap;
use infrastructure_common::ConfigError;
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 缓存条目在某个版本下的解析结果
struct CachedState {
    /// 最近一次成功解码的值，`None` 表示配置中不存在该键
    value: Option<DecodedValue>,
    /// 最近一次解析时的全局版本号，`None` 表示从未解析
    stamp: Option<u64>,
    /// 最近一次成功解码的时间
    updated_at: Option<DateTime<Utc>>,
    /// 该版本下的解码失败信息，旧值保留在 `value` 中
    failure: Option<Arc<str>>,
}

impl CachedState {
    fn unresolved() -> Self {
        Self {
            value: None,
            stamp: None,
            updated_at: None,
            failure: None,
        }
    }
}

/// 解析竞争时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveMode {
    /// 已有发布值时直接返回，用于读取路径
    Stale,
    /// 等待正在进行的解码，用于监听器刷新，确保不会错过本次变更
    Wait,
}

/// 单个 (键, 类型) 的缓存条目
pub(crate) struct CachedEntry {
    key: Arc<str>,
    type_tag: TypeTag,
    state: ArcSwap<CachedState>,
    resolving: Mutex<()>,
}

impl CachedEntry {
    fn new(key: Arc<str>, type_tag: TypeTag) -> Self {
        Self {
            key,
            type_tag,
            state: ArcSwap::from_pointee(CachedState::unresolved()),
            resolving: Mutex::new(()),
        }
    }

    fn outcome(&self, state: &CachedState) -> Result<Option<DecodedValue>, ConfigError> {
        match &state.failure {
            Some(message) => Err(self.decode_error(message)),
            None => Ok(state.value.clone()),
        }
    }

    fn decode_error(&self, message: &str) -> ConfigError {
        ConfigError::DecodeError {
            key: self.key.to_string(),
            type_name: self.type_tag.name().to_string(),
            message: message.to_string(),
        }
    }
}

/// 单个配置键的缓存容器
///
/// 一个键通常只会以一两种类型读取，线性扫描写时复制的小列表即可。
struct PropertyContainer {
    key: Arc<str>,
    entries: ArcSwap<Vec<Arc<CachedEntry>>>,
}

impl PropertyContainer {
    fn new(key: &str) -> Self {
        Self {
            key: Arc::from(key),
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// 获取或创建指定类型的条目，并发创建时失败方复用胜出方的条目
    fn get_or_create(&self, type_tag: TypeTag) -> Arc<CachedEntry> {
        loop {
            let current = self.entries.load_full();
            if let Some(entry) = current.iter().find(|e| e.type_tag == type_tag) {
                return entry.clone();
            }

            let entry = Arc::new(CachedEntry::new(self.key.clone(), type_tag));
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry.clone());

            let previous = self.entries.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return entry;
            }
        }
    }
}

/// 类型化属性工厂
///
/// 持有全局版本号、缓存容器与全局监听器注册表。构造时向底层配置注册
/// 失效监听器，底层配置的任何变更都会递增版本号并驱动一次监听器刷新。
pub struct PropertyFactory {
    config: Arc<dyn Config>,
    decoder: Arc<dyn Decoder>,
    master_version: AtomicU64,
    containers: DashMap<String, Arc<PropertyContainer>>,
    listeners: Arc<ListenerRegistry>,
    invalidator: Arc<dyn ConfigListener>,
}

impl PropertyFactory {
    /// 创建属性工厂并订阅底层配置的变更
    pub fn new(config: Arc<dyn Config>, decoder: Arc<dyn Decoder>) -> Arc<Self> {
        let factory = Arc::new_cyclic(|weak: &Weak<Self>| Self {
            config,
            decoder,
            master_version: AtomicU64::new(0),
            containers: DashMap::new(),
            listeners: Arc::new(ListenerRegistry::new()),
            invalidator: Arc::new(CacheInvalidator {
                factory: weak.clone(),
            }),
        });
        factory.config.add_listener(factory.invalidator.clone());
        info!("属性工厂已绑定配置: {}", factory.config.name());
        factory
    }

    /// 底层配置
    pub fn config(&self) -> &Arc<dyn Config> {
        &self.config
    }

    /// 当前全局版本号
    pub fn version(&self) -> u64 {
        self.master_version.load(Ordering::Acquire)
    }

    /// 已注册的属性监听器数量
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// 递增全局版本号并刷新所有监听器，返回新版本号
    pub fn invalidate(&self) -> u64 {
        let version = self.master_version.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("配置版本递增至 {}", version);
        self.listeners.update_all();
        version
    }

    /// 获取类型化属性，目标类型没有解码器时返回错误
    pub fn try_property<T>(self: &Arc<Self>, key: &str) -> Result<Property<T>, ConfigError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let type_tag = TypeTag::of::<T>();
        if !self.decoder.supports(&type_tag) {
            warn!("属性 {} 请求了未注册解码器的类型 {}", key, type_tag);
            return Err(ConfigError::DecoderNotFound {
                type_name: type_tag.name().to_string(),
            });
        }

        Ok(Property {
            factory: self.clone(),
            entry: self.get_or_create(key, type_tag),
            _type: PhantomData,
        })
    }

    /// 获取类型化属性
    ///
    /// # Panics
    ///
    /// 目标类型没有注册解码器时 panic。这属于编程错误，应在注册阶段暴露。
    pub fn property<T>(self: &Arc<Self>, key: &str) -> Property<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.try_property(key) {
            Ok(property) => property,
            Err(error) => panic!("{}", error),
        }
    }

    /// 字符串属性
    pub fn get_string_property(self: &Arc<Self>, key: &str) -> Property<String> {
        self.property(key)
    }

    /// 32 位整数属性
    pub fn get_int_property(self: &Arc<Self>, key: &str) -> Property<i32> {
        self.property(key)
    }

    /// 64 位整数属性
    pub fn get_long_property(self: &Arc<Self>, key: &str) -> Property<i64> {
        self.property(key)
    }

    /// 布尔属性
    pub fn get_bool_property(self: &Arc<Self>, key: &str) -> Property<bool> {
        self.property(key)
    }

    /// 浮点属性
    pub fn get_double_property(self: &Arc<Self>, key: &str) -> Property<f64> {
        self.property(key)
    }

    /// 时长属性，原始值为毫秒数
    pub fn get_duration_property(self: &Arc<Self>, key: &str) -> Property<Duration> {
        self.property(key)
    }

    /// 导出缓存诊断信息
    pub fn dump(&self) -> PropertyCacheDump {
        let version = self.version();
        let mut entries: Vec<CacheEntryDump> = self
            .containers
            .iter()
            .flat_map(|container| {
                container
                    .entries
                    .load()
                    .iter()
                    .map(|entry| {
                        let state = entry.state.load();
                        CacheEntryDump {
                            key: entry.key.to_string(),
                            type_name: entry.type_tag.name().to_string(),
                            stamp: state.stamp,
                            stale: state.stamp != Some(version),
                            has_value: state.value.is_some(),
                            last_updated: state.updated_at,
                            last_error: state.failure.as_deref().map(str::to_string),
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.type_name.cmp(&b.type_name)));

        PropertyCacheDump {
            version,
            listener_count: self.listeners.len(),
            entries,
        }
    }

    fn get_or_create(&self, key: &str, type_tag: TypeTag) -> Arc<CachedEntry> {
        let existing = self.containers.get(key).map(|container| container.clone());
        let container = match existing {
            Some(container) => container,
            None => self
                .containers
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(PropertyContainer::new(key)))
                .clone(),
        };
        container.get_or_create(type_tag)
    }

    /// 解析条目的当前值
    ///
    /// 戳记与全局版本一致时直接返回缓存；否则解码当前原始值并发布新状态。
    /// 同一条目同一时刻只有一个解析者。读取方在竞争时直接返回已发布的旧值，
    /// 从未解析过的条目以及 [`ResolveMode::Wait`] 则等待正在进行的解码
    /// （纯内存操作，不涉及 I/O）。
    fn try_resolve(
        &self,
        entry: &CachedEntry,
        mode: ResolveMode,
    ) -> Result<Option<DecodedValue>, ConfigError> {
        {
            let state = entry.state.load();
            if state.stamp == Some(self.version()) {
                return entry.outcome(&state);
            }
        }

        let _guard = match entry.resolving.try_lock() {
            Some(guard) => guard,
            None => {
                if mode == ResolveMode::Stale {
                    let state = entry.state.load_full();
                    if state.stamp.is_some() {
                        return entry.outcome(&state);
                    }
                }
                entry.resolving.lock()
            }
        };

        let version = self.version();
        let previous = entry.state.load_full();
        if previous.stamp == Some(version) {
            return entry.outcome(&previous);
        }

        let decoded = match self.config.get_raw_property(&entry.key) {
            Some(raw) => self.decoder.decode(&entry.type_tag, &raw).map(Some),
            None => Ok(None),
        };

        let next = match &decoded {
            Ok(value) => CachedState {
                value: value.clone(),
                stamp: Some(version),
                updated_at: Some(Utc::now()),
                failure: None,
            },
            Err(error) => {
                warn!(
                    "属性 {} 解码为 {} 失败，保留旧值: {}",
                    entry.key, entry.type_tag, error
                );
                CachedState {
                    value: previous.value.clone(),
                    stamp: Some(version),
                    updated_at: previous.updated_at,
                    failure: Some(Arc::from(error.to_string())),
                }
            }
        };

        if previous.stamp < next.stamp {
            entry.state.store(Arc::new(next));
        }

        decoded.map_err(|error| entry.decode_error(&error.to_string()))
    }

    /// 读取路径：解码失败时返回保留的旧值
    fn resolve_or_stale(&self, entry: &CachedEntry) -> Option<DecodedValue> {
        match self.try_resolve(entry, ResolveMode::Stale) {
            Ok(value) => value,
            Err(_) => entry.state.load().value.clone(),
        }
    }
}

impl Drop for PropertyFactory {
    fn drop(&mut self) {
        self.config.remove_listener(&self.invalidator);
    }
}

impl fmt::Debug for PropertyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyFactory")
            .field("config", &self.config.name())
            .field("version", &self.version())
            .field("containers_count", &self.containers.len())
            .field("listeners_count", &self.listeners.len())
            .finish()
    }
}

/// 底层配置变更时使属性缓存失效
struct CacheInvalidator {
    factory: Weak<PropertyFactory>,
}

impl CacheInvalidator {
    fn invalidate(&self) {
        if let Some(factory) = self.factory.upgrade() {
            factory.invalidate();
        }
    }
}

impl ConfigListener for CacheInvalidator {
    fn on_config_added(&self, config: &dyn Config) {
        debug!("配置层加入: {}", config.name());
        self.invalidate();
    }

    fn on_config_removed(&self, config: &dyn Config) {
        debug!("配置层移除: {}", config.name());
        self.invalidate();
    }

    fn on_config_updated(&self, _config: &dyn Config) {
        self.invalidate();
    }

    fn on_error(&self, error: &ConfigError, config: &dyn Config) {
        warn!("配置 {} 报告错误，缓存保持不变: {}", config.name(), error);
    }

    fn name(&self) -> &str {
        "PropertyCacheInvalidator"
    }
}

/// 类型化属性
///
/// 轻量句柄，可随意克隆。读取不会阻塞在 I/O 上，总能返回一个值。
pub struct Property<T> {
    factory: Arc<PropertyFactory>,
    entry: Arc<CachedEntry>,
    _type: PhantomData<fn() -> T>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            entry: self.entry.clone(),
            _type: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("key", &self.entry.key)
            .field("type", &self.entry.type_tag)
            .finish()
    }
}

impl<T> Property<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// 配置键
    pub fn key(&self) -> &str {
        &self.entry.key
    }

    /// 当前值，配置中不存在且从未成功解码时返回 `None`
    pub fn get(&self) -> Option<T> {
        self.factory
            .resolve_or_stale(&self.entry)
            .as_ref()
            .and_then(downcast::<T>)
    }

    /// 当前值，缺失时返回默认值
    pub fn get_or(&self, default: T) -> T {
        self.get().unwrap_or(default)
    }

    /// 当前值，缺失时调用 `f` 生成默认值
    pub fn get_or_else<F>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.get().unwrap_or_else(f)
    }

    /// 订阅属性变更
    ///
    /// 注册时立即以当前值回调一次；之后每次刷新只有在值发生变化时才回调。
    /// 解码失败通过 [`PropertyListener::on_parse_error`] 通知，缓存保留旧值。
    pub fn subscribe<L>(&self, default: T, listener: L) -> PropertySubscription
    where
        T: PartialEq,
        L: PropertyListener<T> + 'static,
    {
        let id = ListenerId::new();
        let factory = Arc::downgrade(&self.factory);
        let entry = self.entry.clone();
        let last_delivered: Mutex<Option<T>> = Mutex::new(None);

        let updater: Updater = Arc::new(move || {
            let Some(factory) = factory.upgrade() else {
                return;
            };
            match factory.try_resolve(&entry, ResolveMode::Wait) {
                Ok(value) => {
                    let value = value
                        .as_ref()
                        .and_then(downcast::<T>)
                        .unwrap_or_else(|| default.clone());
                    {
                        let mut last = last_delivered.lock();
                        if last.as_ref() == Some(&value) {
                            return;
                        }
                        *last = Some(value.clone());
                    }
                    listener.on_change(value);
                }
                Err(error) => {
                    debug!("属性 {} 监听器收到解码错误", entry.key);
                    listener.on_parse_error(&error);
                }
            }
        });

        self.factory.listeners.add(id, updater);
        PropertySubscription::new(id, &self.factory.listeners)
    }

    /// 移除监听器
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.factory.listeners.remove(id)
    }
}

fn downcast<T: Clone + 'static>(value: &DecodedValue) -> Option<T> {
    value.downcast_ref::<T>().cloned()
}
