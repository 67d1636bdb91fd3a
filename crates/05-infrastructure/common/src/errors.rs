//! 错误类型定义

use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置序列化失败: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("配置键不存在: {key}")]
    KeyNotFound { key: String },

    #[error("配置类型转换失败: {message}")]
    TypeConversionError { message: String },

    #[error("配置属性解码失败: {key} -> {type_name}, 原因: {message}")]
    DecodeError {
        key: String,
        type_name: String,
        message: String,
    },

    #[error("未注册类型解码器: {type_name}")]
    DecoderNotFound { type_name: String },

    #[error("配置源拉取失败: {source_name}, 原因: {message}")]
    SourceFetchFailed {
        source_name: String,
        message: String,
    },

    #[error("配置层不存在: {name}")]
    LayerNotFound { name: String },

    #[error("配置层已存在: {name}")]
    DuplicateLayer { name: String },

    #[error("轮询调度失败: {message}")]
    SchedulerError { message: String },

    #[error("配置已停止: {name}")]
    ConfigStopped { name: String },
}

impl ConfigError {
    /// 创建类型转换错误
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversionError {
            message: message.into(),
        }
    }

    /// 创建配置源拉取错误
    pub fn source_fetch_failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFetchFailed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// 是否为解码类错误
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::DecodeError { .. } | Self::TypeConversionError { .. }
        )
    }
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },

    #[error("基础设施关闭失败: {message}")]
    ShutdownFailed { message: String },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
