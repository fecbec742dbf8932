//! # rcu-head
//!
//! Deferred, grace-period-gated destruction for any heap object.
//!
//! An object embeds an [`RcuHead`] and implements [`RcuReclaim`]; it can then be
//! retired with [`RcuReclaim::retire`] and is handed to its destruction policy only
//! after every reader that might still observe it has left its read-side critical
//! section. Three things can be mixed freely:
//!
//! - **Domain**: the process-wide [`default_domain`] or any explicit [`RcuDomain`].
//!   Domains track grace periods independently.
//! - **Policy**: [`DefaultDelete`] (plain drop) or any [`Deleter`], for example a
//!   closure wrapped in [`DeleteWith`].
//! - **Access path**: a `Box<T>` you own, a raw pointer unlinked from a shared
//!   structure ([`RcuReclaim::retire_raw`]), or an [`RcuPtr`] publication point.
//!
//! An object can be scheduled only once; a second attempt returns
//! [`ScheduleError::AlreadyScheduled`].
//!
//! ```
//! use rcu_head::{default_domain, DeleteWith, RcuDomain, RcuHead, RcuReclaim};
//!
//! struct Foo {
//!     head: RcuHead,
//!     a: i32,
//! }
//!
//! impl RcuReclaim for Foo {
//!     type Deleter = rcu_head::DefaultDelete;
//!     fn rcu_head(&self) -> &RcuHead {
//!         &self.head
//!     }
//! }
//!
//! type Logged = DeleteWith<fn(Box<Bar>)>;
//!
//! struct Bar {
//!     head: RcuHead<Logged>,
//!     a: i32,
//! }
//!
//! impl RcuReclaim for Bar {
//!     type Deleter = Logged;
//!     fn rcu_head(&self) -> &RcuHead<Logged> {
//!         &self.head
//!     }
//! }
//!
//! fn log_bar(bar: Box<Bar>) {
//!     println!("In my_deleter: {}", bar.a);
//! }
//!
//! // Default domain, default policy.
//! Box::new(Foo { head: RcuHead::new(), a: 42 }).retire().unwrap();
//! default_domain().barrier();
//!
//! // Explicit domain.
//! let domain = RcuDomain::new();
//! Box::new(Foo { head: RcuHead::new(), a: 43 }).retire_in(&domain).unwrap();
//! domain.barrier();
//!
//! // Custom policy.
//! let bar = Bar { head: RcuHead::with_deleter(DeleteWith(log_bar as fn(Box<Bar>))), a: 44 };
//! Box::new(bar).retire().unwrap();
//! default_domain().barrier();
//! ```
//!
//! 为任意堆对象提供基于宽限期的延迟销毁。
//! 对象嵌入 [`RcuHead`] 并实现 [`RcuReclaim`] 后即可退休，
//! 只有在所有可能仍在观察它的读者离开读端临界区之后，才会被交给其销毁策略。

mod callback;
mod domain;
mod error;
mod head;
mod policy;
mod ptr;
mod reader;
mod state;
mod sync;

pub use domain::{RcuDomain, RcuDomainBuilder};
pub use error::ScheduleError;
pub use head::{RcuHead, RcuReclaim};
pub use policy::{DefaultDelete, DeleteWith, Deleter};
pub use ptr::RcuPtr;
pub use reader::{LocalReader, ReadGuard};

#[cfg(not(feature = "loom"))]
static DEFAULT_DOMAIN: once_cell::sync::Lazy<RcuDomain> =
    once_cell::sync::Lazy::new(RcuDomain::new);

#[cfg(feature = "loom")]
loom::lazy_static! {
    static ref DEFAULT_DOMAIN: RcuDomain = RcuDomain::new();
}

/// The process-wide default domain.
///
/// Created on first use and never torn down; callbacks still pending when the
/// process exits are simply not run. Call `default_domain().barrier()` before
/// exiting if teardown must have happened.
///
/// 进程级默认域。首次使用时创建，永不销毁；
/// 进程退出时仍未执行的回调不会被运行。如需确保拆除已完成，请在退出前调用 `barrier()`。
#[inline]
pub fn default_domain() -> &'static RcuDomain {
    &DEFAULT_DOMAIN
}

#[cfg(all(test, not(feature = "loom")))]
mod tests;
