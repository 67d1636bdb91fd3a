//! 固定延迟轮询调度器

use crate::settings::PollingSettings;
use async_trait::async_trait;
use config_abstractions::{PollCallback, PollingScheduler};
use infrastructure_common::ConfigError;
use parking_lot::Mutex;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 固定延迟轮询调度器
///
/// 每次轮询完成后再等待一个完整间隔，因此调度器自身永远不会产生重叠轮询。
/// 停止只取消两次轮询之间的等待，正在执行的轮询会跑完。
pub struct FixedDelayPollingScheduler {
    settings: PollingSettings,
    token: Mutex<Option<CancellationToken>>,
}

impl FixedDelayPollingScheduler {
    /// 以轮询设置创建调度器
    pub fn new(settings: PollingSettings) -> Self {
        Self {
            settings,
            token: Mutex::new(None),
        }
    }

    /// 轮询设置
    pub fn settings(&self) -> &PollingSettings {
        &self.settings
    }
}

#[async_trait]
impl PollingScheduler for FixedDelayPollingScheduler {
    async fn start(&self, callback: PollCallback) -> Result<(), ConfigError> {
        let token = {
            let mut current = self.token.lock();
            if current.is_some() {
                return Err(ConfigError::SchedulerError {
                    message: "调度器已经启动".to_string(),
                });
            }
            let token = CancellationToken::new();
            *current = Some(token.clone());
            token
        };

        let interval = self.settings.interval();
        let first_delay = if self.settings.sync_initial_poll {
            debug!("执行同步首次轮询");
            callback().await;
            interval
        } else {
            self.settings.initial_delay()
        };

        if token.is_cancelled() {
            return Ok(());
        }

        info!("固定延迟轮询调度启动，间隔: {:?}", interval);
        tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                callback().await;
                delay = interval;
            }
            debug!("固定延迟轮询调度已退出");
        });
        Ok(())
    }

    fn stop(&self) {
        if let Some(token) = self.token.lock().take() {
            token.cancel();
            info!("固定延迟轮询调度已停止");
        }
    }

    fn is_running(&self) -> bool {
        self.token.lock().is_some()
    }

    fn name(&self) -> &str {
        "fixed-delay"
    }
}

impl Drop for FixedDelayPollingScheduler {
    fn drop(&mut self) {
        if let Some(token) = self.token.get_mut().take() {
            token.cancel();
        }
    }
}

impl fmt::Debug for FixedDelayPollingScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedDelayPollingScheduler")
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_abstractions::PollFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> PollCallback {
        let counter = counter.clone();
        Arc::new(move || -> PollFuture {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    fn settings(interval_ms: u64, sync_initial_poll: bool) -> PollingSettings {
        PollingSettings {
            interval_ms,
            initial_delay_ms: 0,
            sync_initial_poll,
        }
    }

    #[tokio::test]
    async fn test_sync_initial_poll_completes_before_start_returns() {
        let scheduler = FixedDelayPollingScheduler::new(settings(60_000, true));
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler.start(counting_callback(&counter)).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_running());
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_polls_repeatedly_until_stopped() {
        let scheduler = FixedDelayPollingScheduler::new(settings(10, false));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_callback(&counter)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.stop();
        assert!(!scheduler.is_running());

        let after_stop = counter.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "实际轮询次数: {}", after_stop);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let scheduler = FixedDelayPollingScheduler::new(settings(60_000, false));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.start(counting_callback(&counter)).await.unwrap();

        let error = scheduler
            .start(counting_callback(&counter))
            .await
            .unwrap_err();
        assert!(matches!(error, ConfigError::SchedulerError { .. }));
        scheduler.stop();
    }
}
