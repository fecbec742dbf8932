//! A panicking destruction policy must take the process down: reclamation is
//! never left half done. The panicking case runs in a child copy of this test
//! binary, selected through an environment variable.

#![cfg(not(feature = "loom"))]

use rcu_head::{Deleter, RcuDomain, RcuHead, RcuReclaim};
use std::env;
use std::process::Command;

const CHILD_ENV: &str = "RCU_HEAD_PANICKING_POLICY_CHILD";

#[derive(Clone)]
struct PanickingDelete;

struct Doomed {
    head: RcuHead<PanickingDelete>,
}

impl Deleter<Doomed> for PanickingDelete {
    fn delete(&self, _object: Box<Doomed>) {
        panic!("policy failed");
    }
}

impl RcuReclaim for Doomed {
    type Deleter = PanickingDelete;

    fn rcu_head(&self) -> &RcuHead<PanickingDelete> {
        &self.head
    }
}

#[test]
fn panicking_policy_aborts_the_process() {
    if env::var_os(CHILD_ENV).is_some() {
        let domain = RcuDomain::new();
        Box::new(Doomed {
            head: RcuHead::with_deleter(PanickingDelete),
        })
        .retire_in(&domain)
        .unwrap();
        domain.barrier();
        // Unreachable when the abort happened; exit cleanly so the parent fails.
        std::process::exit(0);
    }

    let status = Command::new(env::current_exe().unwrap())
        .args(["--exact", "panicking_policy_aborts_the_process", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .status()
        .unwrap();

    assert!(!status.success());

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status.signal(), Some(6), "child should die from SIGABRT");
    }
}
