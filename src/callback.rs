use std::boxed::Box;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::vec::Vec;

/// Upper bound on recycled bags kept around between collections.
const MAX_POOLED_BAGS: usize = 16;

/// What a deferred callback actually runs.
enum Thunk {
    /// A retired object: the raw pointer plus the monomorphised function that
    /// rebuilds the `Box<T>` and hands it to the object's destruction policy.
    /// Two words, no allocation.
    Object {
        ptr: *mut (),
        reclaim: unsafe fn(*mut ()),
    },
    /// An arbitrary callback registered through `RcuDomain::defer`.
    Closure(Box<dyn FnOnce() + Send>),
}

/// A type-erased callback waiting for its grace period.
///
/// The engine only knows "run this after the grace period"; it does not know
/// which object type or destruction policy is behind it.
///
/// 一个等待宽限期结束的类型擦除回调。
/// 引擎只知道"在宽限期之后运行它"，并不知道其背后的对象类型或销毁策略。
pub(crate) struct Deferred {
    thunk: Thunk,
}

// SAFETY: `Thunk::Object` is only built from `T: Send` objects (enforced by
// `RcuReclaim: Send`), and `Thunk::Closure` is `Send` by construction.
unsafe impl Send for Deferred {}

impl Deferred {
    /// Wrap a retired object.
    ///
    /// # Safety
    /// `reclaim(ptr)` must be sound to call exactly once, from any thread,
    /// once the grace period has elapsed.
    #[inline]
    pub(crate) unsafe fn object(ptr: *mut (), reclaim: unsafe fn(*mut ())) -> Self {
        Deferred {
            thunk: Thunk::Object { ptr, reclaim },
        }
    }

    #[inline]
    pub(crate) fn closure<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Deferred {
            thunk: Thunk::Closure(Box::new(f)),
        }
    }

    /// Run the callback.
    ///
    /// Nobody is left to report a failure to, so a panicking callback aborts
    /// the process instead of leaving reclamation half done.
    ///
    /// 运行回调。没有调用者可以接收失败，因此回调 panic 时直接中止进程。
    pub(crate) fn run(self) {
        let thunk = self.thunk;
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || match thunk {
            Thunk::Object { ptr, reclaim } => unsafe { reclaim(ptr) },
            Thunk::Closure(f) => f(),
        }));

        if outcome.is_err() {
            tracing::error!("reclamation callback panicked; aborting the process");
            process::abort();
        }
    }
}

/// Callbacks taken out of a `CallbackSet` to be executed outside its lock.
///
/// 从 `CallbackSet` 中取出、在锁外执行的一批回调。
pub(crate) struct Batch {
    /// Sequence number of the first callback in the batch.
    start: u64,
    bags: Vec<Vec<Deferred>>,
}

impl Batch {
    /// Run every callback in registration order and return how many ran.
    /// The emptied bags stay in the batch so they can be recycled.
    pub(crate) fn run(&mut self) -> usize {
        let mut executed = 0;
        for bag in self.bags.iter_mut() {
            for deferred in bag.drain(..) {
                deferred.run();
                executed += 1;
            }
        }
        executed
    }
}

/// Manages callbacks waiting for their grace period.
///
/// This struct encapsulates the logic for:
/// - Storing callbacks in epoch-ordered bags.
/// - Managing a pool of vectors to reduce allocation overhead.
/// - Handing out expired callbacks and tracking batches still executing,
///   so `barrier()` knows exactly when earlier callbacks have finished.
///
/// Every callback gets a sequence number. Bags are appended in sequence order
/// and always taken from the front, so the pending callbacks are exactly the
/// range `dequeued..registered`.
///
/// 管理等待宽限期结束的回调。
/// - 将回调存储在按纪元排序的袋子中。
/// - 管理向量池以减少分配开销。
/// - 交出已过期的回调并跟踪仍在执行的批次，
///   使 `barrier()` 能准确知道之前的回调何时全部完成。
pub(crate) struct CallbackSet {
    /// Queue of bags, ordered by epoch. Each element is (epoch, bag).
    queue: VecDeque<(usize, Vec<Deferred>)>,
    /// Pool of empty vectors to reduce allocation.
    pool: Vec<Vec<Deferred>>,
    /// Number of callbacks in the queue.
    count: usize,
    /// Total number of callbacks ever registered.
    registered: u64,
    /// Total number of callbacks ever taken out of the queue.
    dequeued: u64,
    /// Start sequence numbers of batches currently executing.
    in_flight: Vec<u64>,
    collection_counter: usize,
}

impl CallbackSet {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            pool: Vec::new(),
            count: 0,
            registered: 0,
            dequeued: 0,
            in_flight: Vec::new(),
            collection_counter: 0,
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of callbacks registered so far. Used as a `barrier()` ticket.
    #[inline]
    pub(crate) fn registered(&self) -> u64 {
        self.registered
    }

    /// Count a collection cycle and return the new total.
    #[inline]
    pub(crate) fn next_cycle(&mut self) -> usize {
        self.collection_counter += 1;
        self.collection_counter
    }

    /// Add a callback for the given epoch.
    ///
    /// If the last bag belongs to the same epoch, the callback is appended to it.
    /// Otherwise, a new bag is created (possibly reused from the pool).
    ///
    /// 为给定纪元添加一个回调。
    /// 如果最后一个袋子属于同一纪元，则追加到其中；否则创建新袋子（可能从池中复用）。
    pub(crate) fn add(&mut self, deferred: Deferred, epoch: usize) {
        let append_to_last = matches!(self.queue.back(), Some((last_epoch, _)) if *last_epoch == epoch);

        if let (true, Some((_, bag))) = (append_to_last, self.queue.back_mut()) {
            bag.push(deferred);
        } else {
            let mut bag = self.pool.pop().unwrap_or_else(|| Vec::with_capacity(16));
            bag.push(deferred);
            self.queue.push_back((epoch, bag));
        }

        self.count += 1;
        self.registered += 1;
    }

    /// Take every callback whose grace period has elapsed.
    ///
    /// - If no reader is active (`min_active_epoch == current_epoch`), everything is expired.
    /// - Otherwise bags from epochs up to `min_active_epoch - 1` are expired; a reader
    ///   pinned at `min_active_epoch` may still observe objects retired in that epoch.
    ///
    /// The returned batch is recorded as in flight until `finish` is called.
    ///
    /// 取出所有宽限期已结束的回调。
    /// 返回的批次在调用 `finish` 之前被记录为"执行中"。
    pub(crate) fn take_expired(
        &mut self,
        min_active_epoch: usize,
        current_epoch: usize,
    ) -> Option<Batch> {
        if min_active_epoch == current_epoch {
            return self.take_all();
        }

        let mut bags = Vec::new();
        if min_active_epoch > 0 {
            let safe_to_reclaim_epoch = min_active_epoch - 1;
            while let Some((epoch, _)) = self.queue.front() {
                if *epoch > safe_to_reclaim_epoch {
                    break;
                }
                if let Some((_, bag)) = self.queue.pop_front() {
                    bags.push(bag);
                }
            }
        }

        self.start_batch(bags)
    }

    /// Take every queued callback regardless of epoch.
    ///
    /// Only sound once no reader can exist any more.
    ///
    /// 不论纪元取出所有排队的回调。仅在不可能再有读者时才是安全的。
    pub(crate) fn take_all(&mut self) -> Option<Batch> {
        let bags: Vec<_> = self.queue.drain(..).map(|(_, bag)| bag).collect();
        self.start_batch(bags)
    }

    fn start_batch(&mut self, bags: Vec<Vec<Deferred>>) -> Option<Batch> {
        if bags.is_empty() {
            return None;
        }

        let taken: usize = bags.iter().map(Vec::len).sum();
        let start = self.dequeued;
        self.count -= taken;
        self.dequeued += taken as u64;
        self.in_flight.push(start);

        Some(Batch { start, bags })
    }

    /// Mark a batch as finished and recycle its bags.
    pub(crate) fn finish(&mut self, batch: Batch) {
        if let Some(index) = self.in_flight.iter().position(|&start| start == batch.start) {
            self.in_flight.swap_remove(index);
        }

        for mut bag in batch.bags {
            if self.pool.len() >= MAX_POOLED_BAGS {
                break;
            }
            bag.clear();
            self.pool.push(bag);
        }
    }

    /// Whether every callback with a sequence number below `ticket` has finished.
    ///
    /// 序号小于 `ticket` 的所有回调是否都已执行完毕。
    pub(crate) fn drained_through(&self, ticket: u64) -> bool {
        self.dequeued >= ticket && self.in_flight.iter().all(|&start| start >= ticket)
    }
}

impl Drop for CallbackSet {
    /// The owning domain is gone, so no reader can exist any more: every
    /// remaining callback has trivially passed its grace period.
    fn drop(&mut self) {
        if self.count == 0 {
            return;
        }

        tracing::debug!(pending = self.count, "flushing callbacks of a dropped domain");

        for (_, bag) in self.queue.drain(..) {
            for deferred in bag {
                deferred.run();
            }
        }
        self.count = 0;
    }
}
