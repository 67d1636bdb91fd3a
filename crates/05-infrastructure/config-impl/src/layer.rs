//! 配置层定义

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// 配置层
///
/// `order` 越小优先级越高。同一 `order` 内默认先加入者优先，
/// 标记为 `reversed` 的层则后加入者优先。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Layer {
    name: Cow<'static, str>,
    order: i32,
    reversed: bool,
}

impl Layer {
    /// 创建自定义配置层
    pub fn new(name: impl Into<Cow<'static, str>>, order: i32) -> Self {
        Self {
            name: name.into(),
            order,
            reversed: false,
        }
    }

    const fn fixed(name: &'static str, order: i32, reversed: bool) -> Self {
        Self {
            name: Cow::Borrowed(name),
            order,
            reversed,
        }
    }

    /// 同一优先级内后加入者优先
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    /// 层名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 优先级
    pub fn order(&self) -> i32 {
        self.order
    }

    /// 是否后加入者优先
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.order)
    }
}

/// 预定义配置层，按优先级从高到低排列
pub struct Layers;

impl Layers {
    pub const RUNTIME: Layer = Layer::fixed("runtime", 100, true);
    pub const TEST: Layer = Layer::fixed("test", 200, false);
    pub const OVERRIDE: Layer = Layer::fixed("override", 300, false);
    pub const SYSTEM: Layer = Layer::fixed("sys", 400, false);
    pub const ENVIRONMENT: Layer = Layer::fixed("env", 500, false);
    pub const REMOTE: Layer = Layer::fixed("remote", 600, false);
    pub const APPLICATION_OVERRIDE: Layer = Layer::fixed("app_override", 700, false);
    pub const APPLICATION: Layer = Layer::fixed("app", 800, false);
    pub const LIBRARY: Layer = Layer::fixed("lib", 900, true);
    pub const DEFAULT: Layer = Layer::fixed("default", 1000, false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_layers_are_ordered() {
        let layers = [
            Layers::RUNTIME,
            Layers::TEST,
            Layers::OVERRIDE,
            Layers::SYSTEM,
            Layers::ENVIRONMENT,
            Layers::REMOTE,
            Layers::APPLICATION_OVERRIDE,
            Layers::APPLICATION,
            Layers::LIBRARY,
            Layers::DEFAULT,
        ];
        assert!(layers.windows(2).all(|w| w[0].order() < w[1].order()));
        assert!(Layers::RUNTIME.is_reversed());
        assert!(Layers::LIBRARY.is_reversed());
    }

    #[test]
    fn test_custom_layer() {
        let layer = Layer::new(format!("tenant-{}", 7), 450).reversed();
        assert_eq!(layer.name(), "tenant-7");
        assert!(layer.is_reversed());
        assert_eq!(layer.to_string(), "tenant-7(450)");
    }
}
