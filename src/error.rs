/// Errors returned when scheduling an object for reclamation.
///
/// 调度对象回收时返回的错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The object was already scheduled and its reclamation has not run yet.
    /// Scheduling it again would free it twice, so nothing was registered and
    /// the object is left to the earlier, still pending reclamation.
    ///
    /// A policy receives the object with the flag cleared, so an object handed
    /// back by a pooling policy can be retired again.
    ///
    /// 对象已被调度且其回收尚未运行。再次调度会导致重复释放，因此没有注册任何回调，
    /// 对象仍由先前尚未执行的回收负责。销毁策略拿到的对象标志已被清除，
    /// 因此池化策略交还的对象可以再次退休。
    #[error("object is already scheduled for reclamation")]
    AlreadyScheduled,
}
