//! # Infrastructure Common
//!
//! Lorn ADSP 动态配置运行时的公共基础设施。
//!
//! ## 核心组件
//!
//! - [`ConfigError`] - 配置错误分类
//! - [`InfrastructureError`] - 基础设施启动/关闭错误
//! - [`LoggingConfig`] / [`init_logging`] - 日志系统初始化

pub mod errors;
pub mod logging;

pub use errors::*;
pub use logging::*;
