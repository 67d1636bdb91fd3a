//! 属性监听抽象接口

use infrastructure_common::ConfigError;

/// 属性监听器 trait
///
/// 只有在解析出的值与上一次投递的值不同时才会收到 `on_change`。
/// 普通闭包 `Fn(T)` 自动实现该 trait，解码错误被忽略。
pub trait PropertyListener<T>: Send + Sync {
    /// 属性值发生变化
    fn on_change(&self, value: T);

    /// 属性值无法解码，缓存保留旧值
    fn on_parse_error(&self, error: &ConfigError) {
        let _ = error;
    }
}

impl<T, F> PropertyListener<T> for F
where
    F: Fn(T) + Send + Sync,
{
    fn on_change(&self, value: T) {
        self(value);
    }
}

/// 属性事件
#[derive(Debug)]
pub enum PropertyEvent<'a, T> {
    /// 新值
    Changed(T),
    /// 解码失败
    ParseError(&'a ConfigError),
}

/// 将单个事件处理函数适配为 [`PropertyListener`]
///
/// 适用于同时关心变更与解码错误、又不想单独定义类型的场景。
pub struct EventListener<F> {
    handler: F,
}

impl<F> EventListener<F> {
    /// 创建事件监听器
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<T, F> PropertyListener<T> for EventListener<F>
where
    F: for<'a> Fn(PropertyEvent<'a, T>) + Send + Sync,
{
    fn on_change(&self, value: T) {
        (self.handler)(PropertyEvent::Changed(value));
    }

    fn on_parse_error(&self, error: &ConfigError) {
        (self.handler)(PropertyEvent::ParseError(error));
    }
}
