//! # Configuration Abstractions
//!
//! 动态配置抽象层，定义配置视图、配置源、轮询调度与类型解码的核心接口。
//!
//! ## 核心接口
//!
//! - [`Config`] - 只读配置视图
//! - [`ConfigListener`] - 配置变更监听
//! - [`SnapshotSource`] - 完整快照配置源
//! - [`PollingScheduler`] - 轮询调度器
//! - [`Decoder`] - 类型解码器
//! - [`PropertyListener`] - 类型化属性监听

pub mod config;
pub mod decoder;
pub mod events;
pub mod property;
pub mod scheduler;
pub mod source;

pub use config::*;
pub use decoder::*;
pub use events::*;
pub use property::*;
pub use scheduler::*;
pub use source::*;
