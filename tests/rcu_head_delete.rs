//! The classic "derived-type" scenario: one type using the default policy, retired
//! on the default domain and on an explicit domain, and one type using a logging
//! policy. Each object must be torn down exactly once.

#![cfg(not(feature = "loom"))]

use rcu_head::{DefaultDelete, Deleter, RcuDomain, RcuHead, RcuReclaim, default_domain};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Foo {
    head: RcuHead,
    a: i32,
    teardowns: Arc<Mutex<Vec<i32>>>,
}

impl Drop for Foo {
    fn drop(&mut self) {
        self.teardowns.lock().unwrap().push(self.a);
    }
}

impl RcuReclaim for Foo {
    type Deleter = DefaultDelete;

    fn rcu_head(&self) -> &RcuHead {
        &self.head
    }
}

#[derive(Clone)]
struct MyDeleter {
    calls: Arc<AtomicUsize>,
    last_value: Arc<AtomicUsize>,
}

impl Deleter<Bar> for MyDeleter {
    fn delete(&self, bar: Box<Bar>) {
        tracing::info!(a = bar.a, "In my_deleter");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_value.store(bar.a as usize, Ordering::SeqCst);
    }
}

struct Bar {
    head: RcuHead<MyDeleter>,
    a: i32,
}

impl RcuReclaim for Bar {
    type Deleter = MyDeleter;

    fn rcu_head(&self) -> &RcuHead<MyDeleter> {
        &self.head
    }
}

#[test]
fn derived_type_approach() {
    let teardowns = Arc::new(Mutex::new(Vec::new()));

    // First with the default domain and default policy.
    let fp = Box::new(Foo {
        head: RcuHead::new(),
        a: 42,
        teardowns: teardowns.clone(),
    });
    fp.retire().unwrap();
    default_domain().barrier();
    assert_eq!(*teardowns.lock().unwrap(), vec![42]);

    // Next with an explicit domain.
    let rs = RcuDomain::new();
    let fp = Box::new(Foo {
        head: RcuHead::new(),
        a: 43,
        teardowns: teardowns.clone(),
    });
    fp.retire_in(&rs).unwrap();
    rs.barrier();
    assert_eq!(*teardowns.lock().unwrap(), vec![42, 43]);

    // Next with my_deleter.
    let deleter = MyDeleter {
        calls: Arc::new(AtomicUsize::new(0)),
        last_value: Arc::new(AtomicUsize::new(0)),
    };
    let my_bar = Box::new(Bar {
        head: RcuHead::with_deleter(deleter.clone()),
        a: 44,
    });
    my_bar.retire().unwrap();
    default_domain().barrier();

    assert_eq!(deleter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(deleter.last_value.load(Ordering::SeqCst), 44);
    assert_eq!(*teardowns.lock().unwrap(), vec![42, 43]);
}
