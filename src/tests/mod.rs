
use crate::{DefaultDelete, Deleter, RcuHead, RcuReclaim};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 使用默认销毁策略的对象，drop 时计数
pub(crate) struct Tracked {
    head: RcuHead,
    pub(crate) value: i32,
    drops: Arc<AtomicUsize>,
}

impl Tracked {
    pub(crate) fn boxed(value: i32, drops: &Arc<AtomicUsize>) -> Box<Self> {
        Box::new(Tracked {
            head: RcuHead::new(),
            value,
            drops: drops.clone(),
        })
    }

    pub(crate) fn head(&self) -> &RcuHead {
        &self.head
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl RcuReclaim for Tracked {
    type Deleter = DefaultDelete;

    fn rcu_head(&self) -> &RcuHead {
        &self.head
    }
}

/// 记录每次调用的自定义销毁策略：(对象地址, 对象值)
#[derive(Clone, Default)]
pub(crate) struct RecordingDelete {
    pub(crate) calls: Arc<Mutex<Vec<(usize, i32)>>>,
}

impl RecordingDelete {
    pub(crate) fn calls(&self) -> Vec<(usize, i32)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Deleter<Recorded> for RecordingDelete {
    fn delete(&self, object: Box<Recorded>) {
        let addr = &*object as *const Recorded as usize;
        self.calls.lock().unwrap().push((addr, object.value));
    }
}

/// 使用自定义销毁策略的对象
pub(crate) struct Recorded {
    head: RcuHead<RecordingDelete>,
    pub(crate) value: i32,
}

impl Recorded {
    pub(crate) fn boxed(value: i32, deleter: &RecordingDelete) -> Box<Self> {
        Box::new(Recorded {
            head: RcuHead::with_deleter(deleter.clone()),
            value,
        })
    }
}

impl RcuReclaim for Recorded {
    type Deleter = RecordingDelete;

    fn rcu_head(&self) -> &RcuHead<RecordingDelete> {
        &self.head
    }
}
