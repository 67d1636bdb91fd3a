//! 类型解码抽象接口

use infrastructure_common::ConfigError;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 解码后的类型擦除值
pub type DecodedValue = Arc<dyn Any + Send + Sync>;

/// 类型描述符
///
/// 以 [`TypeId`] 判等，名称仅用于日志与诊断输出。
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// 获取类型 `T` 的描述符
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// 类型ID
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 类型名称
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 类型解码器 trait
///
/// 将原始配置值转换为目标类型。返回值的实际类型必须与 `type_tag` 一致。
pub trait Decoder: Send + Sync {
    /// 是否支持目标类型
    fn supports(&self, type_tag: &TypeTag) -> bool;

    /// 解码原始配置值
    fn decode(&self, type_tag: &TypeTag, raw: &Value) -> Result<DecodedValue, ConfigError>;
}
