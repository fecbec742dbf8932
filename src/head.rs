use crate::callback::Deferred;
use crate::domain::RcuDomain;
use crate::error::ScheduleError;
use crate::policy::{DefaultDelete, Deleter};
use crate::state::SharedState;
use crate::sync::{AtomicBool, Ordering};
use std::boxed::Box;

/// The attachment record an object embeds to become reclaimable.
///
/// It holds the "already scheduled" flag and the destruction policy `D`.
/// Pair it with an [`RcuReclaim`] implementation:
///
/// ```
/// use rcu_head::{RcuHead, RcuReclaim, default_domain};
///
/// struct Foo {
///     head: RcuHead,
///     a: i32,
/// }
///
/// impl RcuReclaim for Foo {
///     type Deleter = rcu_head::DefaultDelete;
///
///     fn rcu_head(&self) -> &RcuHead {
///         &self.head
///     }
/// }
///
/// let foo = Box::new(Foo { head: RcuHead::new(), a: 42 });
/// assert_eq!(foo.a, 42);
/// foo.retire().unwrap();
/// default_domain().barrier();
/// ```
///
/// 对象为了变得可回收而嵌入的附着记录。
/// 它保存"已调度"标志和销毁策略 `D`，需配合 [`RcuReclaim`] 实现使用。
pub struct RcuHead<D = DefaultDelete> {
    scheduled: AtomicBool,
    deleter: D,
}

impl RcuHead<DefaultDelete> {
    /// Create a head using the default destruction policy.
    /// 使用默认销毁策略创建附着记录。
    #[inline]
    pub fn new() -> Self {
        Self::with_deleter(DefaultDelete)
    }
}

impl<D> RcuHead<D> {
    /// Create a head using a caller-supplied destruction policy.
    /// 使用调用者提供的销毁策略创建附着记录。
    #[inline]
    pub fn with_deleter(deleter: D) -> Self {
        RcuHead {
            scheduled: AtomicBool::new(false),
            deleter,
        }
    }

    /// Whether the owning object has been scheduled for reclamation.
    #[inline]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// The destruction policy stored in this head.
    /// 此附着记录中保存的销毁策略。
    #[inline]
    pub fn deleter(&self) -> &D {
        &self.deleter
    }

    /// Live -> Scheduled. Fails if the transition already happened.
    #[inline]
    fn mark_scheduled(&self) -> Result<(), ScheduleError> {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            Err(ScheduleError::AlreadyScheduled)
        } else {
            Ok(())
        }
    }

    /// Scheduled -> Live, once the object is exclusively owned again.
    #[inline]
    fn reset(&self) {
        self.scheduled.store(false, Ordering::Release);
    }
}

impl<D: Default> Default for RcuHead<D> {
    fn default() -> Self {
        Self::with_deleter(D::default())
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for RcuHead<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcuHead")
            .field("scheduled", &self.is_scheduled())
            .field("deleter", &self.deleter)
            .finish()
    }
}

/// The capability of being reclaimed after a grace period.
///
/// Implementors only provide [`rcu_head`](RcuReclaim::rcu_head) and choose a
/// [`Deleter`]; scheduling is provided. The domain and the policy are independent:
/// any policy works with the default domain, an explicit domain, or a raw pointer.
///
/// An object can be scheduled only once. A second attempt returns
/// [`ScheduleError::AlreadyScheduled`] and registers nothing.
///
/// 在宽限期之后被回收的能力。
/// 实现者只需提供 `rcu_head` 并选择一个 [`Deleter`]，调度逻辑由默认方法提供。
/// 域与策略相互独立。对象只能被调度一次，第二次尝试返回
/// [`ScheduleError::AlreadyScheduled`] 且不会注册任何回调。
pub trait RcuReclaim: Send + Sized + 'static {
    /// The destruction policy applied once the grace period has elapsed.
    type Deleter: Deleter<Self>;

    /// The embedded attachment record.
    fn rcu_head(&self) -> &RcuHead<Self::Deleter>;

    /// Retire this object on the process-wide default domain.
    ///
    /// Returns immediately; the object is handed to its policy after the grace period.
    ///
    /// 在进程级默认域上退休此对象。立即返回；宽限期之后对象被交给其销毁策略。
    #[inline]
    fn retire(self: Box<Self>) -> Result<(), ScheduleError> {
        self.retire_in(crate::default_domain())
    }

    /// Retire this object on an explicit domain.
    ///
    /// Only `domain.barrier()` guarantees that the object has been torn down.
    ///
    /// 在显式指定的域上退休此对象。只有 `domain.barrier()` 能保证对象已被拆除。
    #[inline]
    fn retire_in(self: Box<Self>, domain: &RcuDomain) -> Result<(), ScheduleError> {
        let ptr = Box::into_raw(self);
        // SAFETY: `ptr` comes from `Box::into_raw` of a box we owned, so it is alive.
        unsafe { Self::retire_raw(ptr, domain) }
    }

    /// Retire an object reachable only through a raw pointer, typically one just
    /// unlinked from a shared structure.
    ///
    /// # Safety
    /// - `ptr` must come from `Box::into_raw` (or equivalent `Box<Self>` allocation).
    /// - The object must still be alive: either it was never scheduled, or the caller
    ///   is inside a read-side critical section of the domain it was scheduled on.
    /// - After `Ok(())`, the caller must not access the object outside a critical section.
    ///
    /// 退休一个只能通过裸指针访问的对象（通常是刚从共享结构中摘除的对象）。
    unsafe fn retire_raw(ptr: *mut Self, domain: &RcuDomain) -> Result<(), ScheduleError> {
        // SAFETY: forwarded from the caller.
        unsafe { schedule(ptr, &domain.shared) }
    }
}

/// Live -> Scheduled, then queue the reclamation on `shared`.
///
/// # Safety
/// Same contract as [`RcuReclaim::retire_raw`].
pub(crate) unsafe fn schedule<T: RcuReclaim>(
    ptr: *mut T,
    shared: &SharedState,
) -> Result<(), ScheduleError> {
    // SAFETY: the caller guarantees `ptr` is alive.
    let head = unsafe { (*ptr).rcu_head() };
    head.mark_scheduled()?;

    // SAFETY: the head transitioned Live -> Scheduled exactly once above, so
    // this is the only callback that will rebuild the box.
    let deferred = unsafe { Deferred::object(ptr.cast::<()>(), reclaim_object::<T>) };
    shared.enqueue(deferred);
    Ok(())
}

/// Rebuild the box and hand it to the object's own policy.
///
/// The head is reset first: the policy owns the object outright and may reuse
/// it, for example by pooling it and retiring it again later.
///
/// # Safety
/// `ptr` must be a `*mut T` from `Box::into_raw` that nothing else will free.
unsafe fn reclaim_object<T: RcuReclaim>(ptr: *mut ()) {
    let object = unsafe { Box::from_raw(ptr.cast::<T>()) };
    let head = object.rcu_head();
    head.reset();
    let deleter = head.deleter().clone();
    deleter.delete(object);
}
