//! 轮询调度抽象接口

use async_trait::async_trait;
use infrastructure_common::ConfigError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// 单次轮询任务的 future
pub type PollFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// 轮询回调，每次调用产生一次新的轮询任务
pub type PollCallback = Arc<dyn Fn() -> PollFuture + Send + Sync>;

/// 轮询调度器 trait
///
/// 调度器只负责"何时"触发回调，不持有任何配置状态。
#[async_trait]
pub trait PollingScheduler: Send + Sync {
    /// 开始调度
    ///
    /// 若配置了同步首次轮询，返回前已完成第一次回调。
    async fn start(&self, callback: PollCallback) -> Result<(), ConfigError>;

    /// 停止调度
    ///
    /// 仅取消后续轮询，正在执行的回调不会被中断。
    fn stop(&self);

    /// 是否正在调度
    fn is_running(&self) -> bool;

    /// 获取调度器名称
    fn name(&self) -> &str;
}
