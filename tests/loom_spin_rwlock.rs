//! Model checks of the spinlock's reader/writer/upgrade protocol.
//!
//! Run with: RUSTFLAGS="--cfg loom" cargo test --test loom_spin_rwlock --release

#![cfg(loom)]

use loom::cell::UnsafeCell;
use loom::sync::Arc;
use loom::thread;
use threadsafe::ReadWriteSpinLock;

struct Shared {
    lock: ReadWriteSpinLock,
    value: UnsafeCell<u32>,
}

unsafe impl Sync for Shared {}

impl Shared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            lock: ReadWriteSpinLock::new(),
            value: UnsafeCell::new(0),
        })
    }

    fn read(&self) -> u32 {
        self.value.with(|v| unsafe { *v })
    }

    fn bump(&self) {
        self.value.with_mut(|v| unsafe { *v += 1 });
    }
}

#[test]
fn test_writer_excludes_reader() {
    loom::model(|| {
        let shared = Shared::new();
        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                shared.lock.wrlock();
                shared.bump();
                unsafe { shared.lock.wrunlock() };
            })
        };

        shared.lock.rdlock();
        let seen = shared.read();
        unsafe { shared.lock.rdunlock() };
        assert!(seen <= 1);

        writer.join().unwrap();
        assert_eq!(shared.read(), 1);
    });
}

#[test]
fn test_upgrade_next_to_reader() {
    loom::model(|| {
        let shared = Shared::new();
        let reader = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                shared.lock.rdlock();
                let seen = shared.read();
                unsafe { shared.lock.rdunlock() };
                seen
            })
        };

        loop {
            shared.lock.rdlock();
            if unsafe { shared.lock.rd2wrlock() } {
                shared.bump();
                unsafe { shared.lock.wr2rdlock() };
                assert_eq!(shared.read(), 1);
                unsafe { shared.lock.rdunlock() };
                break;
            }
            // Refused: the reader is still inside and nothing was written.
            assert_eq!(shared.read(), 0);
            unsafe { shared.lock.rdunlock() };
            shared.lock.rd2wryield();
        }

        assert!(reader.join().unwrap() <= 1);
        assert!(shared.lock.is_unlocked());
    });
}

#[test]
fn test_upgrade_ahead_of_waiting_writer() {
    loom::model(|| {
        let shared = Shared::new();
        shared.lock.rdlock();

        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                shared.lock.wrlock();
                shared.bump();
                unsafe { shared.lock.wrunlock() };
            })
        };

        // Sole reader: the upgrade never depends on the writer.
        assert!(unsafe { shared.lock.rd2wrlock() });
        shared.bump();
        unsafe { shared.lock.wrunlock() };

        writer.join().unwrap();
        assert_eq!(shared.read(), 2);
        assert!(shared.lock.is_unlocked());
    });
}
