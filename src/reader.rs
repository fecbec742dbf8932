use crate::state::{INACTIVE_EPOCH, ReaderSlot, SharedState};
use crate::sync::{Arc, AtomicUsize, Cell, Ordering};

/// A reader thread's handle on one reclamation domain.
///
/// Each reader thread should create exactly one `LocalReader` per domain via
/// `RcuDomain::register_reader()`. It is `!Sync` (due to `Cell`) and must be stored per-thread.
///
/// The `LocalReader` is used to enter read-side critical sections via `read_lock()`.
/// While a critical section is open, no object retired on this domain after the
/// reader entered can be reclaimed.
///
/// 读者线程在一个回收域上的句柄。
/// 每个读者线程应当通过 `RcuDomain::register_reader()` 为每个域创建恰好一个 `LocalReader`。
/// 它是 `!Sync` 的（因为 `Cell`），必须在每个线程中存储。
/// 通过 `read_lock()` 进入读端临界区；临界区打开期间，
/// 读者进入之后在该域上退休的对象都不会被回收。
pub struct LocalReader {
    slot: Arc<ReaderSlot>,
    pub(crate) shared: Arc<SharedState>,
    pin_count: Cell<usize>,
}

impl LocalReader {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        let slot = Arc::new(ReaderSlot {
            active_epoch: AtomicUsize::new(INACTIVE_EPOCH),
        });

        shared.readers.lock().push(Arc::clone(&slot));
        shared.acquire_handle();

        LocalReader {
            slot,
            shared,
            pin_count: Cell::new(0),
        }
    }

    /// Enter a read-side critical section.
    ///
    /// Returns a `ReadGuard` that keeps the critical section open for its lifetime.
    ///
    /// **Reentrancy**: nested calls are allowed and a guard can be cloned; the
    /// reader leaves the critical section when the last guard is dropped.
    ///
    /// ```ignore
    /// let guard1 = reader.read_lock();
    /// let guard2 = reader.read_lock();  // Reentrant call
    /// let guard3 = guard1.clone();      // Clone for nested scope
    /// ```
    ///
    /// Do not call `RcuDomain::barrier()` or `RcuDomain::synchronize()` on the same
    /// domain while holding a guard: they would wait for this reader forever.
    ///
    /// 进入读端临界区。可重入：嵌套调用与克隆守卫均可，最后一个守卫被 drop 时离开临界区。
    /// 持有守卫时不要在同一个域上调用 `barrier()` 或 `synchronize()`，否则会永远等待本读者。
    #[inline]
    pub fn read_lock(&self) -> ReadGuard<'_> {
        let pin_count = self.pin_count.get();

        if pin_count == 0 {
            loop {
                let current_epoch = self.shared.global_epoch.load(Ordering::SeqCst);
                self.slot
                    .active_epoch
                    .store(current_epoch, Ordering::SeqCst);

                // The epoch must still be current after the slot store: a collector
                // that advances it afterwards is then guaranteed to see the slot.
                let recheck = self.shared.global_epoch.load(Ordering::SeqCst);
                let min_active = self.shared.min_active_epoch.load(Ordering::SeqCst);
                if recheck == current_epoch && current_epoch >= min_active {
                    break;
                }
                std::hint::spin_loop();
            }
        }

        self.pin_count.set(pin_count + 1);

        ReadGuard { reader: self }
    }

    /// Whether this reader is currently inside a read-side critical section.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.pin_count.get() > 0
    }
}

impl Drop for LocalReader {
    fn drop(&mut self) {
        self.shared.release_handle();
    }
}

impl std::fmt::Debug for LocalReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalReader")
            .field("pin_count", &self.pin_count.get())
            .finish()
    }
}

/// A guard that keeps a read-side critical section open.
///
/// `ReadGuard` is obtained by calling `LocalReader::read_lock()`.
/// It is `!Send` and `!Sync` because it references a `!Sync` `LocalReader`,
/// and its lifetime is bound to that reader.
///
/// References obtained through `RcuPtr::load()` are bound to the guard, so they
/// cannot outlive the critical section that protects them.
///
/// 保持读端临界区打开的守卫。
/// 通过 `LocalReader::read_lock()` 获得，是 `!Send` 和 `!Sync` 的，
/// 生命周期绑定到其来源的 `LocalReader`。
/// 通过 `RcuPtr::load()` 获得的引用被绑定到守卫，不能活得比保护它的临界区更久。
#[must_use]
pub struct ReadGuard<'a> {
    pub(crate) reader: &'a LocalReader,
}

impl<'a> Clone for ReadGuard<'a> {
    /// Clone this guard to create a nested critical section.
    /// 克隆此守卫以创建嵌套临界区。
    #[inline]
    fn clone(&self) -> Self {
        let pin_count = self.reader.pin_count.get();

        assert!(
            pin_count > 0,
            "BUG: Cloning a ReadGuard outside a critical section (pin_count = 0). \
             This indicates incorrect API usage or a library bug."
        );

        self.reader.pin_count.set(pin_count + 1);

        ReadGuard {
            reader: self.reader,
        }
    }
}

impl<'a> Drop for ReadGuard<'a> {
    #[inline]
    fn drop(&mut self) {
        let pin_count = self.reader.pin_count.get();

        assert!(
            pin_count > 0,
            "BUG: Dropping a ReadGuard outside a critical section (pin_count = 0). \
             This indicates incorrect API usage or a library bug."
        );

        if pin_count == 1 {
            self.reader
                .slot
                .active_epoch
                .store(INACTIVE_EPOCH, Ordering::SeqCst);
        }

        self.reader.pin_count.set(pin_count - 1);
    }
}
