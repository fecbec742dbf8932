use crate::domain::RcuDomain;
use crate::error::ScheduleError;
use crate::head::{self, RcuReclaim};
use crate::reader::ReadGuard;
use crate::state::SharedState;
use crate::sync::{Arc, AtomicPtr, Ordering};
use std::boxed::Box;
use std::marker::PhantomData;

/// A published, domain-bound pointer to a reclaimable object.
///
/// `RcuPtr<T>` is the usual publication point in RCU code: readers `load()` it
/// inside a critical section, writers `replace()` it, and the replaced object is
/// retired through its own [`RcuHead`](crate::RcuHead) on the pointer's domain.
///
/// The pointer does not count as a handle on its domain, so an `RcuPtr` owned
/// by a retired object does not keep that object's own callback from running
/// when the domain's last handle goes away.
///
/// **Safety Contract**:
/// - Readers must hold a `ReadGuard` of the pointer's domain when calling `load()`.
/// - The lifetime of the returned reference from `load()` is bound to the `ReadGuard`.
///
/// **Typical Usage**:
/// ```
/// use rcu_head::{RcuDomain, RcuHead, RcuPtr, RcuReclaim};
///
/// struct Config {
///     head: RcuHead,
///     level: u32,
/// }
///
/// impl RcuReclaim for Config {
///     type Deleter = rcu_head::DefaultDelete;
///     fn rcu_head(&self) -> &RcuHead {
///         &self.head
///     }
/// }
///
/// let domain = RcuDomain::new();
/// let shared = RcuPtr::new_in(Box::new(Config { head: RcuHead::new(), level: 1 }), &domain);
///
/// // Reader thread:
/// let reader = domain.register_reader();
/// let guard = reader.read_lock();
/// assert_eq!(shared.load(&guard).level, 1);
/// drop(guard);
///
/// // Writer thread:
/// shared.replace(Box::new(Config { head: RcuHead::new(), level: 2 })).unwrap();
/// domain.barrier();
/// ```
///
/// 一个已发布的、绑定到域的可回收对象指针。
/// 读者在临界区内 `load()`，写入者 `replace()`，被替换的对象通过其自身的
/// `RcuHead` 在指针所属的域上退休。
pub struct RcuPtr<T: RcuReclaim> {
    ptr: AtomicPtr<T>,
    shared: Arc<SharedState>,
    // Send/Sync follow `T`: readers on other threads get `&T`.
    _marker: PhantomData<Box<T>>,
}

impl<T: RcuReclaim> RcuPtr<T> {
    /// Publish `value` under the process-wide default domain.
    #[inline]
    pub fn new(value: Box<T>) -> Self {
        Self::new_in(value, crate::default_domain())
    }

    /// Publish `value` under an explicit domain.
    #[inline]
    pub fn new_in(value: Box<T>, domain: &RcuDomain) -> Self {
        Self {
            ptr: AtomicPtr::new(Box::into_raw(value)),
            shared: domain.shared.clone(),
            _marker: PhantomData,
        }
    }

    /// A new handle on the domain this pointer is bound to.
    /// 返回此指针所绑定的域的一个新句柄。
    #[inline]
    pub fn domain(&self) -> RcuDomain {
        RcuDomain::attach(self.shared.clone())
    }

    /// Reader load: read the currently published object.
    ///
    /// # Panics
    /// Panics if `guard` belongs to a different domain than this pointer.
    ///
    /// 读取者 load：读取当前发布的对象。若 `guard` 属于其他域则 panic。
    #[inline]
    pub fn load<'guard>(&self, guard: &'guard ReadGuard<'_>) -> &'guard T {
        assert!(
            Arc::ptr_eq(&guard.reader.shared, &self.shared),
            "ReadGuard belongs to a different domain than this RcuPtr"
        );

        let ptr = self.ptr.load(Ordering::Acquire);
        // SAFETY: the pointer is never null, and the object it points to is only
        // reclaimed after every critical section open at unpublication has ended.
        unsafe { &*ptr }
    }

    /// Writer replace: publish `value` and retire the previously published object.
    ///
    /// Fails with `AlreadyScheduled` if the old object had been retired by other
    /// means; the new value is published either way.
    ///
    /// 写入者 replace：发布 `value` 并退休之前发布的对象。
    pub fn replace(&self, value: Box<T>) -> Result<(), ScheduleError> {
        let new_ptr = Box::into_raw(value);
        let old_ptr = self.ptr.swap(new_ptr, Ordering::AcqRel);

        // SAFETY: `old_ptr` came from `Box::into_raw` and was published until the
        // swap above, so only a reclamation scheduled through this call can free it.
        unsafe { head::schedule(old_ptr, &self.shared) }
    }
}

impl<T: RcuReclaim> std::fmt::Debug for RcuPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ptr = self.ptr.load(Ordering::Relaxed);
        f.debug_tuple("RcuPtr").field(&ptr).finish()
    }
}

impl<T: RcuReclaim> Drop for RcuPtr<T> {
    /// Readers may still hold references obtained under a guard, so the last
    /// published object is retired rather than dropped in place.
    ///
    /// 读者可能仍持有在守卫下获得的引用，因此最后发布的对象被退休而不是直接 drop。
    fn drop(&mut self) {
        let ptr = self.ptr.load(Ordering::Acquire);
        // SAFETY: `ptr` is the published object, which stays alive until retired.
        if let Err(err) = unsafe { head::schedule(ptr, &self.shared) } {
            tracing::warn!(%err, "published object was retired elsewhere before its RcuPtr dropped");
        }
    }
}
