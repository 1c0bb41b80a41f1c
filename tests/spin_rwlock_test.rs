use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Barrier};
use std::thread;
use std::time::Duration;
use threadsafe::prelude::*;
use threadsafe::{AccessError, RawRwLock, ReadWrite, ReadWriteMutex, ReadWriteSpinLock, Unlocked};

#[derive(Default)]
struct Probe {
    readers: AtomicUsize,
    writers: AtomicUsize,
    max_readers: AtomicUsize,
}

impl Probe {
    fn enter_read(&self) {
        let now = self.readers.fetch_add(1, Ordering::SeqCst) + 1;
        assert_eq!(self.writers.load(Ordering::SeqCst), 0, "reader next to a writer");
        self.max_readers.fetch_max(now, Ordering::SeqCst);
    }

    fn exit_read(&self) {
        self.readers.fetch_sub(1, Ordering::SeqCst);
    }

    fn enter_write(&self) {
        assert_eq!(self.writers.fetch_add(1, Ordering::SeqCst), 0, "two writers");
        assert_eq!(self.readers.load(Ordering::SeqCst), 0, "writer next to a reader");
    }

    fn exit_write(&self) {
        self.writers.fetch_sub(1, Ordering::SeqCst);
    }
}

fn mutual_exclusion<L: RawRwLock + Default + Sync>() {
    const THREADS: usize = 6;
    const ROUNDS: usize = 2_000;

    let value: Unlocked<(u64, u64), ReadWrite<L>> = Unlocked::default();
    let probe = Probe::default();

    thread::scope(|s| {
        for i in 0..THREADS {
            let (value, probe) = (&value, &probe);
            s.spawn(move || {
                for round in 0..ROUNDS {
                    match (i + round) % 4 {
                        0 => {
                            let mut w = value.wat();
                            probe.enter_write();
                            w.0 += 1;
                            w.1 += 1;
                            probe.exit_write();
                        }
                        1 => loop {
                            let mut r = value.rat();
                            probe.enter_read();
                            assert_eq!(r.0, r.1);
                            probe.exit_read();
                            if let Ok(mut w) = r.upgrade() {
                                probe.enter_write();
                                w.0 += 1;
                                w.1 += 1;
                                probe.exit_write();
                                break;
                            }
                            drop(r);
                            value.rd2wryield();
                        },
                        2 => {
                            let mut carry = value.w2r_carry();
                            {
                                let mut w = carry.wat();
                                probe.enter_write();
                                w.0 += 1;
                                w.1 += 1;
                                probe.exit_write();
                            }
                            let r = carry.rat();
                            probe.enter_read();
                            assert_eq!(r.0, r.1);
                            probe.exit_read();
                        }
                        _ => {
                            let r = value.crat();
                            probe.enter_read();
                            assert_eq!(r.0, r.1);
                            probe.exit_read();
                        }
                    }
                }
            });
        }
    });

    let expected = (THREADS * ROUNDS * 3 / 4) as u64;
    assert_eq!(*value.crat(), (expected, expected));
}

fn readers_overlap<L: RawRwLock + Default + Sync>() {
    const READERS: usize = 4;

    let value: Unlocked<u32, ReadWrite<L>> = Unlocked::new(7);
    let probe = Probe::default();
    let inside = Barrier::new(READERS);

    thread::scope(|s| {
        for _ in 0..READERS {
            let (value, probe, inside) = (&value, &probe, &inside);
            s.spawn(move || {
                let r = value.rat();
                probe.enter_read();
                // Every reader must be inside at once to get past this.
                inside.wait();
                assert_eq!(*r, 7);
                probe.exit_read();
            });
        }
    });

    assert_eq!(probe.max_readers.load(Ordering::SeqCst), READERS);
}

fn concurrent_upgrades<L: RawRwLock + Default + Sync>() {
    let value: Unlocked<u32, ReadWrite<L>> = Unlocked::new(0);
    let both_reading = Barrier::new(2);
    let failures = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..2 {
            let (value, both_reading, failures) = (&value, &both_reading, &failures);
            s.spawn(move || {
                let mut first_round = true;
                loop {
                    let mut r = value.rat();
                    if first_round {
                        both_reading.wait();
                        first_round = false;
                    }
                    if let Ok(mut w) = r.upgrade() {
                        *w += 1;
                        break;
                    }
                    failures.fetch_add(1, Ordering::SeqCst);
                    drop(r);
                    value.rd2wryield();
                }
            });
        }
    });

    // The first attempt sees both readers and is refused; retries finish.
    assert!(failures.load(Ordering::SeqCst) >= 1);
    assert_eq!(*value.crat(), 2);
}

fn upgrade_refused_next_to_own_reader<L: RawRwLock + Default + Sync>() {
    let value: Unlocked<u32, ReadWrite<L>> = Unlocked::new(5);
    let other = value.crat();
    let mut r = value.rat();
    assert_eq!(r.upgrade().err(), Some(AccessError::UpgradeContended));
    assert_eq!(*r, 5);
    drop(other);
    drop(r);

    let mut r = value.rat();
    *r.upgrade().unwrap() += 1;
    drop(r);
    assert_eq!(*value.crat(), 6);
}

fn upgrade_refused_next_to_parked_reader<L: RawRwLock + Default + Sync>() {
    let value: Unlocked<u32, ReadWrite<L>> = Unlocked::new(0);
    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    thread::scope(|s| {
        let value = &value;
        s.spawn(move || {
            let r = value.crat();
            held_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            drop(r);
        });
        held_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        s.spawn(move || {
            let mut r = value.rat();
            let refused = r.upgrade().err();
            done_tx.send(refused).unwrap();
        });
        let outcome = done_rx.recv_timeout(Duration::from_secs(2));
        // Let the reader go first so a waiting upgrade cannot hang the scope.
        release_tx.send(()).unwrap();
        let refused = outcome.expect("upgrade waited for the other reader instead of failing");
        assert_eq!(refused, Some(AccessError::UpgradeContended));
    });

    assert_eq!(*value.wat(), 0);
}

#[test]
fn test_spinlock_mutual_exclusion() {
    mutual_exclusion::<ReadWriteSpinLock>();
}

#[test]
fn test_mutex_mutual_exclusion() {
    mutual_exclusion::<ReadWriteMutex>();
}

#[test]
fn test_spinlock_readers_overlap() {
    readers_overlap::<ReadWriteSpinLock>();
}

#[test]
fn test_mutex_readers_overlap() {
    readers_overlap::<ReadWriteMutex>();
}

#[test]
fn test_spinlock_concurrent_upgrades() {
    concurrent_upgrades::<ReadWriteSpinLock>();
}

#[test]
fn test_mutex_concurrent_upgrades() {
    concurrent_upgrades::<ReadWriteMutex>();
}

#[test]
fn test_spinlock_upgrade_refused_next_to_own_reader() {
    upgrade_refused_next_to_own_reader::<ReadWriteSpinLock>();
}

#[test]
fn test_mutex_upgrade_refused_next_to_own_reader() {
    upgrade_refused_next_to_own_reader::<ReadWriteMutex>();
}

#[test]
fn test_spinlock_upgrade_refused_next_to_other_thread_reader() {
    upgrade_refused_next_to_parked_reader::<ReadWriteSpinLock>();
}

#[test]
fn test_mutex_upgrade_refused_next_to_other_thread_reader() {
    upgrade_refused_next_to_parked_reader::<ReadWriteMutex>();
}

#[test]
fn test_writer_priority() {
    let lock = ReadWriteSpinLock::new();
    lock.rdlock();
    thread::scope(|s| {
        let writer = s.spawn(|| {
            lock.wrlock();
            unsafe { lock.wrunlock() };
        });
        // Once the writer is queued no new reader gets in.
        while lock.try_rdlock() {
            unsafe { lock.rdunlock() };
            thread::yield_now();
        }
        assert!(lock.is_read_locked());
        unsafe { lock.rdunlock() };
        writer.join().unwrap();
    });
    assert!(lock.is_unlocked());
}
