use std::boxed::Box;
use std::fmt;

/// A destruction policy: the action that actually tears down a reclaimed object.
///
/// The policy is invoked exactly once per object, after the grace period of the
/// domain the object was retired on, on whichever thread drives collection.
/// It receives ownership of the object and is responsible for all of its cleanup;
/// nothing else is done to the object afterwards.
///
/// Policies are stored in the object's [`RcuHead`](crate::RcuHead) and cloned out
/// of it right before the object is handed over, so they should be cheap to clone
/// (zero-sized types, `Arc`s, function pointers).
///
/// A policy must not panic. A panicking policy aborts the process.
///
/// 销毁策略：真正拆除被回收对象的动作。
///
/// 每个对象恰好调用一次，发生在对象所退休的域的宽限期之后，
/// 运行在驱动回收的任意线程上。策略获得对象的所有权并负责其全部清理，
/// 之后框架不会再对该对象做任何事。策略不得 panic，否则进程将被中止。
pub trait Deleter<T>: Clone + Send + 'static {
    /// Tear down `object`.
    fn delete(&self, object: Box<T>);
}

/// The default policy: run the object's `Drop` and release its storage.
///
/// 默认策略：运行对象的 `Drop` 并释放其存储。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultDelete;

impl<T> Deleter<T> for DefaultDelete {
    #[inline]
    fn delete(&self, object: Box<T>) {
        drop(object);
    }
}

/// Adapts a closure into a [`Deleter`].
///
/// ```
/// use rcu_head::{DeleteWith, Deleter};
///
/// let log = DeleteWith(|object: Box<i32>| println!("reclaiming {}", object));
/// log.delete(Box::new(7));
/// ```
///
/// 将闭包适配为 [`Deleter`]。
#[derive(Clone, Copy, Default)]
pub struct DeleteWith<F>(pub F);

impl<T, F> Deleter<T> for DeleteWith<F>
where
    F: Fn(Box<T>) + Clone + Send + 'static,
{
    #[inline]
    fn delete(&self, object: Box<T>) {
        (self.0)(object)
    }
}

impl<F> fmt::Debug for DeleteWith<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeleteWith(..)")
    }
}
