//! 默认类型解码器
//!
//! 以 [`TypeId`] 为键的解码函数注册表。内置常用标量类型，
//! 自定义类型通过 [`DefaultDecoder::register`] 或
//! [`DefaultDecoder::register_deserialize`] 注册。

use config_abstractions::{DecodedValue, Decoder, TypeTag};
use infrastructure_common::ConfigError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::TypeId;
use std::borrow::Cow;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

type DecodeFn = Arc<dyn Fn(&Value) -> Result<DecodedValue, ConfigError> + Send + Sync>;

/// 默认类型解码器
#[derive(Clone)]
pub struct DefaultDecoder {
    decoders: HashMap<TypeId, (TypeTag, DecodeFn)>,
}

impl DefaultDecoder {
    /// 创建包含内置类型的解码器
    pub fn new() -> Self {
        let mut decoder = Self::empty();
        decoder.register::<String, _>(decode_string);
        decoder.register::<bool, _>(decode_bool);
        decoder.register::<i32, _>(decode_parsed::<i32>);
        decoder.register::<i64, _>(decode_parsed::<i64>);
        decoder.register::<u32, _>(decode_parsed::<u32>);
        decoder.register::<u64, _>(decode_parsed::<u64>);
        decoder.register::<usize, _>(decode_parsed::<usize>);
        decoder.register::<f32, _>(decode_parsed::<f32>);
        decoder.register::<f64, _>(decode_parsed::<f64>);
        decoder.register::<Duration, _>(decode_duration);
        decoder.register::<Vec<String>, _>(decode_string_list);
        decoder
    }

    /// 创建不含任何类型的空解码器
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// 注册类型解码函数，已存在时覆盖
    pub fn register<T, F>(&mut self, decode: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Value) -> Result<T, ConfigError> + Send + Sync + 'static,
    {
        let tag = TypeTag::of::<T>();
        let decode_fn: DecodeFn = Arc::new(move |raw| {
            decode(raw).map(|value| Arc::new(value) as DecodedValue)
        });
        self.decoders.insert(tag.id(), (tag, decode_fn));
        self
    }

    /// 通过 serde 注册结构化类型
    ///
    /// 字符串原始值先按 JSON 文本解析，其余值直接反序列化。
    pub fn register_deserialize<T>(&mut self) -> &mut Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.register::<T, _>(|raw| match raw {
            Value::String(text) => serde_json::from_str(text).map_err(ConfigError::from),
            other => serde_json::from_value(other.clone()).map_err(ConfigError::from),
        })
    }

    /// 已注册的类型名称
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.decoders.values().map(|(tag, _)| tag.name()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for DefaultDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefaultDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultDecoder")
            .field("registered_types", &self.registered_types())
            .finish()
    }
}

impl Decoder for DefaultDecoder {
    fn supports(&self, type_tag: &TypeTag) -> bool {
        self.decoders.contains_key(&type_tag.id())
    }

    fn decode(&self, type_tag: &TypeTag, raw: &Value) -> Result<DecodedValue, ConfigError> {
        let (_, decode) =
            self.decoders
                .get(&type_tag.id())
                .ok_or_else(|| ConfigError::DecoderNotFound {
                    type_name: type_tag.name().to_string(),
                })?;
        decode(raw)
    }
}

/// 取标量的文本表示，数组与对象不能作为标量解码
fn scalar_text(raw: &Value) -> Result<Cow<'_, str>, ConfigError> {
    match raw {
        Value::String(s) => Ok(Cow::Borrowed(s.trim())),
        Value::Number(n) => Ok(Cow::Owned(n.to_string())),
        Value::Bool(b) => Ok(Cow::Owned(b.to_string())),
        Value::Null => Err(ConfigError::type_conversion("空值无法解码")),
        other => Err(ConfigError::type_conversion(format!(
            "非标量值无法解码: {}",
            other
        ))),
    }
}

fn decode_string(raw: &Value) -> Result<String, ConfigError> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Err(ConfigError::type_conversion("空值无法解码")),
        other => Ok(other.to_string()),
    }
}

fn decode_bool(raw: &Value) -> Result<bool, ConfigError> {
    let text = scalar_text(raw)?;
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::type_conversion(format!(
            "无法解析为布尔值: {}",
            text
        ))),
    }
}

fn decode_parsed<T>(raw: &Value) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text = scalar_text(raw)?;
    text.parse::<T>().map_err(|e| {
        ConfigError::type_conversion(format!(
            "无法解析 '{}' 为 {}: {}",
            text,
            std::any::type_name::<T>(),
            e
        ))
    })
}

fn decode_duration(raw: &Value) -> Result<Duration, ConfigError> {
    decode_parsed::<u64>(raw).map(Duration::from_millis)
}

fn decode_string_list(raw: &Value) -> Result<Vec<String>, ConfigError> {
    match raw {
        Value::Array(items) => items.iter().map(decode_string).collect(),
        other => Ok(scalar_text(other)?
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()),
    }
}
