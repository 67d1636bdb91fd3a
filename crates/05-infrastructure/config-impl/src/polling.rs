//! 快照轮询配置
//!
//! 周期性地从配置源拉取完整快照，并以一次引用替换整体发布。
//! 同一实例的轮询不会并发：忙标志 CAS 失败的轮询直接跳过，不排队。

use crate::listener_list::ConfigListenerList;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use config_abstractions::{
    Config, ConfigListener, PollCallback, PollFuture, PollingScheduler, Snapshot, SnapshotSource,
};
use infrastructure_common::ConfigError;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 单次轮询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 新快照已发布
    Applied { key_count: usize },
    /// 拉取失败，保留旧快照
    Failed { message: String },
    /// 上一次轮询仍在进行，本次跳过
    Skipped,
    /// 配置已停止，拉取结果被丢弃
    Discarded,
}

/// 轮询统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStatus {
    /// 成功次数
    pub success_count: u64,
    /// 失败次数
    pub failure_count: u64,
    /// 因上一次轮询未结束而跳过的次数
    pub skipped_count: u64,
    /// 最近一次成功时间
    pub last_success: Option<DateTime<Utc>>,
    /// 最近一次失败时间
    pub last_failure: Option<DateTime<Utc>>,
    /// 最近一次失败的错误信息
    pub last_error: Option<String>,
    /// 最近一次轮询耗时（毫秒）
    pub last_duration_ms: Option<u64>,
    /// 当前快照的配置项数量
    pub key_count: usize,
}

impl PollStatus {
    fn record_success(&mut self, key_count: usize, elapsed: Duration) {
        self.success_count += 1;
        self.last_success = Some(Utc::now());
        self.last_duration_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self.key_count = key_count;
    }

    fn record_failure(&mut self, error: &ConfigError, elapsed: Duration) {
        self.failure_count += 1;
        self.last_failure = Some(Utc::now());
        self.last_duration_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self.last_error = Some(error.to_string());
    }
}

/// 离开作用域时清除忙标志，轮询 future 被丢弃时同样生效
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 快照轮询配置
pub struct PollingConfig {
    name: String,
    source: Arc<dyn SnapshotSource>,
    snapshot: ArcSwap<Snapshot>,
    busy: AtomicBool,
    stopped: AtomicBool,
    listeners: ConfigListenerList,
    status: Mutex<PollStatus>,
    scheduler: Mutex<Option<Arc<dyn PollingScheduler>>>,
}

impl PollingConfig {
    /// 创建轮询配置，初始快照为空
    pub fn new(name: impl Into<String>, source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            name: name.into(),
            source,
            snapshot: ArcSwap::from_pointee(Snapshot::new()),
            busy: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            listeners: ConfigListenerList::new(),
            status: Mutex::new(PollStatus::default()),
            scheduler: Mutex::new(None),
        }
    }

    /// 执行一次轮询
    pub async fn poll(&self) -> PollOutcome {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("轮询配置 {} 上一次轮询尚未完成，跳过本次", self.name);
            self.status.lock().skipped_count += 1;
            return PollOutcome::Skipped;
        }
        let _busy = BusyGuard(&self.busy);

        if self.is_stopped() {
            return PollOutcome::Discarded;
        }

        let started = Instant::now();
        let result = self.source.fetch_snapshot().await;
        let elapsed = started.elapsed();

        if self.is_stopped() {
            info!("轮询配置 {} 已停止，丢弃本次拉取结果", self.name);
            return PollOutcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                let key_count = snapshot.len();
                self.snapshot.store(Arc::new(snapshot));
                self.status.lock().record_success(key_count, elapsed);
                debug!(
                    "轮询配置 {} 发布新快照: {} 个配置项, 耗时 {:?}",
                    self.name, key_count, elapsed
                );
                self.listeners.notify_updated(self);
                PollOutcome::Applied { key_count }
            }
            Err(error) => {
                warn!("轮询配置 {} 拉取失败，保留旧快照: {}", self.name, error);
                self.status.lock().record_failure(&error, elapsed);
                self.listeners.notify_error(&error, self);
                PollOutcome::Failed {
                    message: error.to_string(),
                }
            }
        }
    }

    /// 交给调度器周期执行
    pub async fn start(
        self: &Arc<Self>,
        scheduler: Arc<dyn PollingScheduler>,
    ) -> Result<(), ConfigError> {
        if self.is_stopped() {
            return Err(ConfigError::ConfigStopped {
                name: self.name.clone(),
            });
        }

        {
            let mut current = self.scheduler.lock();
            if current.is_some() {
                return Err(ConfigError::SchedulerError {
                    message: format!("轮询配置 {} 已经启动", self.name),
                });
            }
            *current = Some(scheduler.clone());
        }

        let weak = Arc::downgrade(self);
        let callback: PollCallback = Arc::new(move || -> PollFuture {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(config) = weak.upgrade() {
                    config.poll().await;
                }
            })
        });

        info!(
            "轮询配置 {} 启动，配置源: {}, 调度器: {}",
            self.name,
            self.source.name(),
            scheduler.name()
        );
        if let Err(error) = scheduler.start(callback).await {
            self.scheduler.lock().take();
            return Err(error);
        }
        Ok(())
    }

    /// 停止后续轮询，保留最后一次成功的快照
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(scheduler) = self.scheduler.lock().take() {
            scheduler.stop();
        }
        info!("轮询配置 {} 已停止", self.name);
    }

    /// 是否已停止
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// 是否有调度器在驱动轮询
    pub fn is_running(&self) -> bool {
        !self.is_stopped()
            && self
                .scheduler
                .lock()
                .as_ref()
                .map_or(false, |scheduler| scheduler.is_running())
    }

    /// 轮询统计
    pub fn status(&self) -> PollStatus {
        self.status.lock().clone()
    }

    /// 配置源名称
    pub fn source_name(&self) -> &str {
        self.source.name()
    }
}

impl Config for PollingConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_raw_property(&self, key: &str) -> Option<Value> {
        self.snapshot.load().get(key).cloned()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.snapshot.load().contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.snapshot.load().keys().cloned().collect()
    }

    fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    fn size(&self) -> usize {
        self.snapshot.load().len()
    }

    fn add_listener(&self, listener: Arc<dyn ConfigListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn ConfigListener>) {
        self.listeners.remove(listener);
    }
}

impl Drop for PollingConfig {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.get_mut().take() {
            scheduler.stop();
        }
    }
}

impl fmt::Debug for PollingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingConfig")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("size", &self.size())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
