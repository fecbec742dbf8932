use crate::callback::Deferred;
use crate::reader::LocalReader;
use crate::state::{AUTO_RECLAIM_THRESHOLD, DEFAULT_CLEANUP_INTERVAL, SharedState};
use crate::sync::{self, Arc, Ordering};

/// Builder for configuring an `RcuDomain`.
///
/// Use this builder to customize reclamation behavior:
/// - `auto_reclaim_threshold`: pending callback count that makes `defer` run a collection
/// - `cleanup_interval`: how often to clean up dead reader slots
///
/// # Example
/// ```
/// use rcu_head::RcuDomain;
///
/// let domain = RcuDomain::builder()
///     .auto_reclaim_threshold(128)
///     .cleanup_interval(32)
///     .build();
/// ```
///
/// 用于配置 `RcuDomain` 的构建器。
pub struct RcuDomainBuilder {
    auto_reclaim_threshold: Option<usize>,
    cleanup_interval: usize,
}

impl RcuDomainBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            auto_reclaim_threshold: Some(AUTO_RECLAIM_THRESHOLD),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }

    /// Set the automatic reclamation threshold.
    ///
    /// When the number of pending callbacks exceeds this threshold after a `defer`,
    /// the deferring thread runs `collect()`. Collection never waits for readers,
    /// it only runs callbacks whose grace period already elapsed.
    /// Pass `None` to disable automatic reclamation.
    ///
    /// Default: `Some(64)`
    ///
    /// 设置自动回收阈值。
    /// 当 `defer` 之后待执行回调数量超过此阈值时，调用线程会执行 `collect()`。
    /// 传递 `None` 可禁用自动回收。
    #[inline]
    pub fn auto_reclaim_threshold(mut self, threshold: impl Into<Option<usize>>) -> Self {
        self.auto_reclaim_threshold = threshold.into();
        self
    }

    /// Set the cleanup interval for dead reader slots.
    ///
    /// Dead reader slots are cleaned up every N collection cycles to reduce overhead.
    /// Set to `0` to disable periodic cleanup (not recommended).
    ///
    /// Default: `16`
    ///
    /// 设置死读者槽的清理间隔。设置为 `0` 可禁用定期清理（不推荐）。
    #[inline]
    pub fn cleanup_interval(mut self, interval: usize) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Build the `RcuDomain` with the configured settings.
    /// 使用配置的设置构建 `RcuDomain`。
    #[inline]
    pub fn build(self) -> RcuDomain {
        tracing::debug!(
            auto_reclaim_threshold = ?self.auto_reclaim_threshold,
            cleanup_interval = self.cleanup_interval,
            "creating rcu domain"
        );

        RcuDomain::attach(Arc::new(SharedState::new(
            self.auto_reclaim_threshold,
            self.cleanup_interval,
        )))
    }
}

impl Default for RcuDomainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A reclamation domain: one independent instance of grace-period tracking.
///
/// A domain manages:
/// - The global epoch counter.
/// - Registration of reader threads.
/// - The queue of callbacks waiting for their grace period.
///
/// Grace periods of distinct domains are tracked separately: a reader inside a
/// critical section of domain A never delays callbacks registered on domain B.
///
/// `RcuDomain` is `Clone`; clones refer to the same domain. When the last handle
/// and the last `LocalReader` of a domain are dropped, every callback still
/// pending on it runs on the dropping thread. The process-wide default instance
/// is returned by [`default_domain`](crate::default_domain).
///
/// **Typical Usage**:
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use rcu_head::RcuDomain;
///
/// let domain = RcuDomain::new();
/// let runs = Arc::new(AtomicUsize::new(0));
///
/// let counter = runs.clone();
/// domain.defer(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// domain.barrier();
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
///
/// 回收域：一个独立的宽限期跟踪实例。
/// 不同域的宽限期相互独立：域 A 临界区内的读者不会延迟域 B 上注册的回调。
/// `RcuDomain` 是 `Clone` 的，克隆体指向同一个域。
/// 最后一个句柄和最后一个 `LocalReader` 被 drop 时，仍待执行的回调会在该线程上运行。
pub struct RcuDomain {
    pub(crate) shared: Arc<SharedState>,
}

impl RcuDomain {
    /// Wrap `shared` in a new user handle.
    #[inline]
    pub(crate) fn attach(shared: Arc<SharedState>) -> Self {
        shared.acquire_handle();
        RcuDomain { shared }
    }

    /// Create a new, independent domain with default settings.
    /// 创建一个新的、独立的、使用默认设置的域。
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the domain.
    /// 创建一个用于配置域的构建器。
    #[inline]
    pub fn builder() -> RcuDomainBuilder {
        RcuDomainBuilder::new()
    }

    /// Whether two handles refer to the same domain.
    /// 两个句柄是否指向同一个域。
    #[inline]
    pub fn same_domain(a: &RcuDomain, b: &RcuDomain) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }

    /// Register a new reader for the current thread.
    ///
    /// Returns a `LocalReader` that should be stored per-thread.
    ///
    /// 为当前线程注册一个新的读者。返回的 `LocalReader` 应当在每个线程中存储。
    #[inline]
    pub fn register_reader(&self) -> LocalReader {
        LocalReader::new(self.shared.clone())
    }

    /// Register a callback to run once the current grace period has elapsed.
    ///
    /// Returns immediately. The callback runs later on whichever thread drives
    /// collection (`collect`, `barrier`, an automatic collection, or the drop of
    /// the last handle to this domain). It must not panic; a panicking callback
    /// aborts the process.
    ///
    /// 注册一个在当前宽限期结束后运行的回调。立即返回。
    /// 回调之后会在驱动回收的任意线程上运行，不得 panic。
    pub fn defer<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.enqueue(Deferred::closure(f));
    }

    /// Perform one collection cycle.
    ///
    /// This method:
    /// 1. Advances the global epoch.
    /// 2. Scans all readers to find the minimum active epoch.
    /// 3. Runs every callback registered in an epoch older than the minimum active epoch
    ///    (or all of them if no reader is inside a critical section).
    ///
    /// Never waits for readers. Callbacks run on the calling thread, outside the
    /// domain's internal locks. Returns the number of callbacks executed.
    ///
    /// 执行一个回收周期：推进全局纪元，扫描读者找到最小活跃纪元，
    /// 运行所有注册于更早纪元的回调。从不等待读者。返回执行的回调数量。
    #[inline]
    pub fn collect(&self) -> usize {
        self.shared.collect()
    }

    /// Block until every callback registered on this domain before the call
    /// has run to completion.
    ///
    /// Returns immediately when nothing is pending. Callbacks registered after
    /// the call are not waited for. Must not be called from inside a read-side
    /// critical section of this domain, nor from inside one of its callbacks.
    ///
    /// 阻塞直到调用之前在本域上注册的所有回调都执行完毕。
    /// 没有待执行回调时立即返回。不得在本域的读端临界区内或本域的回调中调用。
    pub fn barrier(&self) {
        let ticket = self.shared.callbacks.lock().registered();

        loop {
            self.collect();

            if self.shared.callbacks.lock().drained_through(ticket) {
                break;
            }

            sync::yield_now();
        }
    }

    /// Block until a full grace period has elapsed: every reader that was inside
    /// a critical section of this domain when the call started has left it.
    ///
    /// Runs no callbacks. Must not be called from inside a critical section of this domain.
    ///
    /// 阻塞直到一个完整的宽限期结束：调用开始时处于本域临界区内的读者都已离开。
    pub fn synchronize(&self) {
        let target_epoch = self.shared.global_epoch.fetch_add(1, Ordering::SeqCst) + 1;

        while self.shared.scan_readers(target_epoch, false) < target_epoch {
            sync::yield_now();
        }
    }

    /// Number of callbacks registered but not yet executed.
    /// 已注册但尚未执行的回调数量。
    #[inline]
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Number of reader slots currently tracked, including slots of dropped
    /// readers that have not been cleaned up yet.
    #[inline]
    pub fn reader_count(&self) -> usize {
        self.shared.reader_count()
    }
}

impl Clone for RcuDomain {
    fn clone(&self) -> Self {
        Self::attach(self.shared.clone())
    }
}

impl Drop for RcuDomain {
    fn drop(&mut self) {
        self.shared.release_handle();
    }
}

impl Default for RcuDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RcuDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcuDomain")
            .field("epoch", &self.shared.global_epoch.load(Ordering::Relaxed))
            .field("pending", &self.pending())
            .finish()
    }
}
