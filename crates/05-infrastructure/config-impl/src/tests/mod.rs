//! 动态配置运行时场景测试


use crate::manager::DynamicConfigManager;
use crate::settings::{DynamicConfigSettings, PollingSettings};

/// 轮询间隔足够长，测试中只有同步首次轮询与手动轮询会发生
pub(crate) fn manual_poll_manager() -> DynamicConfigManager {
    let settings = DynamicConfigSettings {
        polling: PollingSettings {
            interval_ms: 3_600_000,
            initial_delay_ms: 0,
            sync_initial_poll: true,
        },
        ..DynamicConfigSettings::default()
    };
    DynamicConfigManager::new(settings).unwrap()
}
