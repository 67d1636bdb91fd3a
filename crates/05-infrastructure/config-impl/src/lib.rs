//! # Configuration Implementation
//!
//! 动态配置运行时的具体实现。
//!
//! ## 主要组件
//!
//! - [`DynamicConfigManager`] - 动态配置管理器
//! - [`PropertyFactory`] / [`Property`] - 全局版本失效的类型化属性缓存
//! - [`ListenerRegistry`] - 全局属性监听器注册表
//! - [`PollingConfig`] - 快照轮询配置
//! - [`CompositeConfig`] - 分层组合配置
//! - [`FixedDelayPollingScheduler`] - 固定延迟轮询调度器
//! - [`DefaultDecoder`] - 默认类型解码器

pub mod composite;
pub mod decoders;
pub mod diagnostics;
pub mod layer;
pub mod listener_list;
pub mod manager;
pub mod map_config;
pub mod polling;
pub mod property;
pub mod registry;
pub mod scheduler;
pub mod settings;
pub mod sources;

pub use composite::*;
pub use decoders::*;
pub use diagnostics::*;
pub use layer::*;
pub use listener_list::*;
pub use manager::*;
pub use map_config::*;
pub use polling::*;
pub use property::*;
pub use registry::*;
pub use scheduler::*;
pub use settings::*;
pub use sources::*;

#[cfg(test)]
mod tests;
