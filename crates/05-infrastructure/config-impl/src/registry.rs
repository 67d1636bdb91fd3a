//! 全局属性监听器注册表
//!
//! 所有活跃的属性监听器集中登记在这里，由一次全量刷新统一驱动，
//! 而不是挂在各自的缓存条目上。刷新只遍历已注册的更新器，
//! 与配置键的总数无关。

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error};
use uuid::Uuid;

/// 更新器：重新解析绑定的属性并决定是否回调监听器
pub type Updater = Arc<dyn Fn() + Send + Sync>;

/// 监听器标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// 生成新的监听器标识
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 全局监听器注册表
pub struct ListenerRegistry {
    /// 监听器查找表
    lookup: DashMap<ListenerId, Updater>,
    /// 刷新顺序列表（写时复制）
    update_order: ArcSwap<Vec<(ListenerId, Updater)>>,
}

impl ListenerRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            lookup: DashMap::new(),
            update_order: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// 注册更新器并立即执行一次，使订阅方先观察到当前状态
    pub fn add(&self, id: ListenerId, updater: Updater) {
        debug!("注册属性监听器: {}", id);
        self.lookup.insert(id, updater.clone());
        self.update_order.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push((id, updater.clone()));
            next
        });
        Self::invoke(id, &updater);
    }

    /// 移除更新器，进行中的刷新会跳过它
    pub fn remove(&self, id: ListenerId) -> bool {
        if self.lookup.remove(&id).is_none() {
            return false;
        }
        self.update_order.rcu(|current| {
            current
                .iter()
                .filter(|(existing, _)| *existing != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        debug!("移除属性监听器: {}", id);
        true
    }

    /// 执行所有已注册的更新器
    pub fn update_all(&self) {
        let snapshot = self.update_order.load_full();
        debug!("刷新属性监听器: {} 个", snapshot.len());
        for (id, updater) in snapshot.iter() {
            if !self.lookup.contains_key(id) {
                continue;
            }
            Self::invoke(*id, updater);
        }
    }

    /// 是否包含指定监听器
    pub fn contains(&self, id: ListenerId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// 已注册的监听器数量
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    fn invoke(id: ListenerId, updater: &Updater) {
        if catch_unwind(AssertUnwindSafe(|| updater())).is_err() {
            error!("属性监听器 {} 执行时发生 panic，已跳过", id);
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners_count", &self.len())
            .finish()
    }
}

/// 订阅句柄
///
/// 丢弃句柄不会取消订阅，注册表持有更新器的强引用，
/// 必须显式调用 [`unsubscribe`](Self::unsubscribe)。
#[derive(Debug, Clone)]
pub struct PropertySubscription {
    id: ListenerId,
    registry: Weak<ListenerRegistry>,
}

impl PropertySubscription {
    pub(crate) fn new(id: ListenerId, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    /// 监听器标识
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// 是否仍处于订阅状态
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map_or(false, |registry| registry.contains(self.id))
    }

    /// 取消订阅
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .map_or(false, |registry| registry.remove(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_updater(counter: &Arc<AtomicUsize>) -> Updater {
        let counter = counter.clone();
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_add_invokes_immediately() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.add(ListenerId::new(), counting_updater(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_update_all_reaches_every_listener() {
        let registry = ListenerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        registry.add(ListenerId::new(), counting_updater(&first));
        registry.add(ListenerId::new(), counting_updater(&second));

        registry.update_all();
        registry.update_all();

        assert_eq!(first.load(Ordering::SeqCst), 3);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_removed_listener_is_skipped() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = ListenerId::new();
        registry.add(id, counting_updater(&counter));

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        registry.update_all();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removal_during_sweep_skips_remaining_target() {
        let registry = Arc::new(ListenerRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let victim = ListenerId::new();
        let armed = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&registry);
        let armed_flag = armed.clone();
        registry.add(
            ListenerId::new(),
            Arc::new(move || {
                if armed_flag.load(Ordering::SeqCst) == 1 {
                    if let Some(registry) = weak.upgrade() {
                        registry.remove(victim);
                    }
                }
            }),
        );
        registry.add(victim, counting_updater(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        armed.store(1, Ordering::SeqCst);
        registry.update_all();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_panicking_updater_does_not_abort_sweep() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_updater = calls.clone();

        registry.add(
            ListenerId::new(),
            Arc::new(move || {
                if calls_in_updater.fetch_add(1, Ordering::SeqCst) > 0 {
                    panic!("decode exploded");
                }
            }),
        );
        registry.add(ListenerId::new(), counting_updater(&counter));

        registry.update_all();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscription_handle() {
        let registry = Arc::new(ListenerRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let id = ListenerId::new();
        registry.add(id, counting_updater(&counter));

        let subscription = PropertySubscription::new(id, &registry);
        assert!(subscription.is_active());
        drop(subscription.clone());
        assert!(registry.contains(id), "丢弃句柄不会取消订阅");

        assert!(subscription.unsubscribe());
        assert!(!registry.contains(id));
    }
}
