use std::sync::Barrier;
use std::thread;
use threadsafe::prelude::*;
use threadsafe::{
    derived, ConstUnlockedBase, FutexMutex, OneThread, Primitive, ReadWrite, ReadWriteMutex,
    Unlocked, UnlockedBase,
};

trait B {
    fn modify(&mut self);
    fn describe(&self) -> String;
}

struct A {
    m: i32,
}

impl B for A {
    fn modify(&mut self) {
        self.m += 1;
    }

    fn describe(&self) -> String {
        format!("m = {}", self.m)
    }
}

struct Counter {
    hits: u64,
}

impl B for Counter {
    fn modify(&mut self) {
        self.hits += 1;
    }

    fn describe(&self) -> String {
        format!("hits = {}", self.hits)
    }
}

derived!(A => dyn B);
derived!(Counter => dyn B);
derived!(Counter => dyn B + Send + Sync);

fn f<P: threadsafe::Policy>(b: UnlockedBase<'_, dyn B, P>) -> String {
    b.wat().modify();
    let r = b.rat();
    r.describe()
}

#[test]
fn test_trait_object_view_all_policies() {
    let primitive: Unlocked<A, Primitive<FutexMutex>> = Unlocked::new(A { m: 42 });
    let readwrite: Unlocked<A, ReadWrite<ReadWriteMutex>> = Unlocked::new(A { m: 42 });
    let onethread: Unlocked<A, OneThread> = Unlocked::new(A { m: 42 });

    assert_eq!(f(primitive.as_base()), "m = 43");
    assert_eq!(f(readwrite.as_base()), "m = 43");
    assert_eq!(f(onethread.as_base()), "m = 43");

    assert_eq!(primitive.into_inner().m, 43);
    assert!(readwrite.policy().raw().is_unlocked());
}

#[test]
fn test_heterogeneous_views_share_one_protocol() {
    type Policy = ReadWrite<ReadWriteMutex>;

    let a: Unlocked<A, Policy> = Unlocked::new(A { m: 0 });
    let counter: Unlocked<Counter, Policy> = Unlocked::new(Counter { hits: 0 });
    let views: [UnlockedBase<'_, dyn B, Policy>; 2] = [a.as_base(), counter.as_base()];

    for view in views {
        for _ in 0..3 {
            view.wat().modify();
        }
    }

    let read_only: Vec<ConstUnlockedBase<'_, dyn B, Policy>> =
        views.iter().map(|view| view.as_const()).collect();
    let described: Vec<String> = read_only.iter().map(|view| view.crat().describe()).collect();
    assert_eq!(described, ["m = 3", "hits = 3"]);
}

#[test]
fn test_view_and_wrapper_exclude_each_other() {
    const THREADS: usize = 4;
    const ROUNDS: u64 = 500;

    let counter: Unlocked<Counter, ReadWrite<ReadWriteMutex>> = Unlocked::new(Counter { hits: 0 });
    let view: UnlockedBase<'_, dyn B + Send + Sync, _> = counter.as_base();
    let start = Barrier::new(THREADS);

    thread::scope(|s| {
        for i in 0..THREADS {
            let start = &start;
            let counter = &counter;
            s.spawn(move || {
                start.wait();
                for _ in 0..ROUNDS {
                    if i % 2 == 0 {
                        view.wat().modify();
                    } else {
                        counter.wat().hits += 1;
                    }
                }
            });
        }
    });

    assert_eq!(counter.crat().hits, THREADS as u64 * ROUNDS);
}
