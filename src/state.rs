use crate::callback::{Batch, CallbackSet, Deferred};
use crate::sync::{Arc, AtomicUsize, Mutex, Ordering};
use std::vec::Vec;

/// Default threshold for automatic collection (count of pending callbacks).
/// 自动回收的默认阈值（待执行回调的数量）。
pub(crate) const AUTO_RECLAIM_THRESHOLD: usize = 64;

/// Default interval for cleaning up dead reader slots (in collection cycles).
/// 清理死读者槽的默认间隔（以回收周期为单位）。
pub(crate) const DEFAULT_CLEANUP_INTERVAL: usize = 16;

/// Represents a reader that is not currently inside a read-side critical section.
/// 表示当前不在读端临界区内的读者。
pub(crate) const INACTIVE_EPOCH: usize = usize::MAX;

/// A slot allocated for a reader thread to record its active epoch.
///
/// Cache-aligned to prevent false sharing between readers.
///
/// 为读者线程分配的槽，用于记录其活跃纪元。
/// 缓存对齐以防止读者之间的伪共享。
#[derive(Debug)]
#[repr(align(64))]
pub(crate) struct ReaderSlot {
    /// The epoch currently observed by the reader, or INACTIVE_EPOCH.
    /// 读者当前观察的纪元，或 INACTIVE_EPOCH。
    pub(crate) active_epoch: AtomicUsize,
}

/// Shared state of one reclamation domain.
///
/// Every `RcuDomain` handle, `LocalReader` and `RcuPtr` holds an `Arc` to it.
/// Only `RcuDomain` handles and `LocalReader`s count as user handles: once the
/// last of them is gone no reader can exist, and every pending callback is run
/// even if an `RcuPtr` (possibly owned by a pending object) still holds the `Arc`.
///
/// 一个回收域的共享状态。
/// 每个 `RcuDomain` 句柄、`LocalReader` 和 `RcuPtr` 都持有它的 `Arc`。
/// 只有 `RcuDomain` 句柄和 `LocalReader` 计为用户句柄：最后一个用户句柄消失后
/// 不可能再有读者，所有待执行回调都会被运行，即使某个 `RcuPtr`
/// （可能由待回收对象持有）仍然持有该 `Arc`。
#[repr(align(64))]
pub(crate) struct SharedState {
    /// The global monotonic epoch counter.
    /// 全局单调纪元计数器。
    pub(crate) global_epoch: AtomicUsize,
    /// The minimum epoch among all active readers (cached, never decreases).
    /// 所有活跃读者中的最小纪元（缓存值，永不减小）。
    pub(crate) min_active_epoch: AtomicUsize,
    /// List of all registered reader slots.
    /// 所有注册读者槽的列表。
    pub(crate) readers: Mutex<Vec<Arc<ReaderSlot>>>,
    /// Callbacks waiting for their grace period, ordered by epoch.
    /// 等待宽限期结束的回调，按纪元排序。
    pub(crate) callbacks: Mutex<CallbackSet>,
    /// Registered but not yet executed callbacks. Lock-free fast path for `defer`.
    /// 已注册但尚未执行的回调数量。
    pub(crate) pending: AtomicUsize,
    /// Live `RcuDomain` handles plus live `LocalReader`s.
    /// 存活的 `RcuDomain` 句柄与 `LocalReader` 数量。
    handles: AtomicUsize,
    pub(crate) auto_reclaim_threshold: Option<usize>,
    pub(crate) cleanup_interval: usize,
}

impl SharedState {
    pub(crate) fn new(auto_reclaim_threshold: Option<usize>, cleanup_interval: usize) -> Self {
        SharedState {
            global_epoch: AtomicUsize::new(0),
            min_active_epoch: AtomicUsize::new(0),
            readers: Mutex::new(Vec::new()),
            callbacks: Mutex::new(CallbackSet::new()),
            pending: AtomicUsize::new(0),
            handles: AtomicUsize::new(0),
            auto_reclaim_threshold,
            cleanup_interval,
        }
    }

    /// Scan all reader slots and return the minimum epoch a reader is pinned at,
    /// or `new_epoch` when no reader is inside a critical section.
    ///
    /// With `cleanup` set, slots whose `LocalReader` was dropped are removed.
    ///
    /// 扫描所有读者槽，返回读者被钉住的最小纪元；
    /// 若没有读者处于临界区内则返回 `new_epoch`。
    pub(crate) fn scan_readers(&self, new_epoch: usize, cleanup: bool) -> usize {
        let mut min_active_epoch = new_epoch;
        let mut readers = self.readers.lock();
        let mut dead_count = 0;

        for slot in readers.iter() {
            let epoch = slot.active_epoch.load(Ordering::SeqCst);
            if epoch != INACTIVE_EPOCH {
                min_active_epoch = min_active_epoch.min(epoch);
            } else if cleanup && Arc::strong_count(slot) == 1 {
                // Only this Vec holds a reference, the LocalReader was dropped
                dead_count += 1;
            }
        }

        if cleanup && dead_count > 0 {
            readers.retain(|slot| Arc::strong_count(slot) > 1);
        }

        drop(readers);

        self.min_active_epoch.fetch_max(min_active_epoch, Ordering::SeqCst);
        min_active_epoch
    }

    #[inline]
    pub(crate) fn acquire_handle(&self) {
        self.handles.fetch_add(1, Ordering::SeqCst);
    }

    /// Give up a user handle. Releasing the last one runs every pending callback.
    /// 释放一个用户句柄。释放最后一个时运行所有待执行回调。
    pub(crate) fn release_handle(&self) {
        if self.handles.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.flush_orphaned();
        }
    }

    #[inline]
    fn is_orphaned(&self) -> bool {
        self.handles.load(Ordering::SeqCst) == 0
    }

    /// Queue a callback under the current epoch, then collect if the pending
    /// count exceeds the auto-reclaim threshold.
    ///
    /// A domain without user handles has no readers, so the callback is run
    /// right away.
    ///
    /// 以当前纪元排队一个回调；若待执行数量超过自动回收阈值则执行回收。
    /// 没有用户句柄的域不可能有读者，回调会被立即运行。
    pub(crate) fn enqueue(&self, deferred: Deferred) {
        let pending = {
            let mut callbacks = self.callbacks.lock();
            let current_epoch = self.global_epoch.load(Ordering::SeqCst);
            callbacks.add(deferred, current_epoch);
            self.pending.fetch_add(1, Ordering::AcqRel) + 1
        };

        if self.is_orphaned() {
            self.flush_orphaned();
        } else if let Some(threshold) = self.auto_reclaim_threshold {
            if pending > threshold {
                self.collect();
            }
        }
    }

    /// One collection cycle; see `RcuDomain::collect`.
    pub(crate) fn collect(&self) -> usize {
        let batch = {
            let mut callbacks = self.callbacks.lock();
            if callbacks.is_empty() {
                return 0;
            }

            let new_epoch = self.global_epoch.fetch_add(1, Ordering::SeqCst) + 1;

            let cycle = callbacks.next_cycle();
            let should_cleanup = self.cleanup_interval > 0 && cycle % self.cleanup_interval == 0;

            let min_active_epoch = self.scan_readers(new_epoch, should_cleanup);
            callbacks.take_expired(min_active_epoch, new_epoch)
        };

        match batch {
            Some(batch) => self.run_batch(batch),
            None => 0,
        }
    }

    /// Run everything queued while no user handle exists.
    ///
    /// The handle count is re-checked under the callbacks lock: a handle
    /// obtained again through `RcuPtr::domain` may have registered a reader.
    fn flush_orphaned(&self) {
        loop {
            let batch = {
                let mut callbacks = self.callbacks.lock();
                if self.is_orphaned() {
                    callbacks.take_all()
                } else {
                    None
                }
            };

            match batch {
                Some(batch) => {
                    let executed = self.run_batch(batch);
                    tracing::debug!(executed, "flushed callbacks of an orphaned domain");
                }
                None => break,
            }
        }
    }

    /// Run a batch outside the callbacks lock, then recycle it.
    fn run_batch(&self, mut batch: Batch) -> usize {
        let executed = batch.run();
        self.pending.fetch_sub(executed, Ordering::AcqRel);
        self.callbacks.lock().finish(batch);

        tracing::trace!(executed, "rcu collection cycle");
        executed
    }

    #[inline]
    pub(crate) fn reader_count(&self) -> usize {
        self.readers.lock().len()
    }
}
