#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use threadsafe::{derived, OneThread, Primitive, RawMutex, RawRwLock, ReadWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    ReadLocked,
    WriteLocked,
}

/// A read-write lock for single-threaded tests: it records its state and
/// every operation, and panics on any transition a correct token layer never
/// makes.
#[derive(Debug)]
pub struct TestRwLock {
    state: Cell<LockState>,
    log: RefCell<Vec<&'static str>>,
}

impl Default for TestRwLock {
    fn default() -> Self {
        Self {
            state: Cell::new(LockState::Unlocked),
            log: RefCell::new(Vec::new()),
        }
    }
}

impl TestRwLock {
    fn transition(&self, op: &'static str, from: LockState, to: LockState) {
        assert_eq!(self.state.get(), from, "TestRwLock: bad {op} to {to:?}");
        self.state.set(to);
        self.log.borrow_mut().push(op);
    }

    pub fn state(&self) -> LockState {
        self.state.get()
    }

    /// Returns the operations performed since the last call, oldest first.
    pub fn take_log(&self) -> Vec<&'static str> {
        self.log.take()
    }
}

unsafe impl RawRwLock for TestRwLock {
    fn rdlock(&self) {
        self.transition("rdlock", LockState::Unlocked, LockState::ReadLocked);
    }

    unsafe fn rdunlock(&self) {
        self.transition("rdunlock", LockState::ReadLocked, LockState::Unlocked);
    }

    fn wrlock(&self) {
        self.transition("wrlock", LockState::Unlocked, LockState::WriteLocked);
    }

    unsafe fn wrunlock(&self) {
        self.transition("wrunlock", LockState::WriteLocked, LockState::Unlocked);
    }

    unsafe fn rd2wrlock(&self) -> bool {
        self.transition("rd2wrlock", LockState::ReadLocked, LockState::WriteLocked);
        true
    }

    unsafe fn wr2rdlock(&self) {
        self.transition("wr2rdlock", LockState::WriteLocked, LockState::ReadLocked);
    }

    fn rd2wryield(&self) {
        self.log.borrow_mut().push("rd2wryield");
    }
}

/// An exclusive lock for single-threaded tests.
#[derive(Debug, Default)]
pub struct TestMutex {
    locked: Cell<bool>,
}

unsafe impl RawMutex for TestMutex {
    fn lock(&self) {
        assert!(!self.locked.get(), "TestMutex: locked twice");
        self.locked.set(true);
    }

    fn try_lock(&self) -> bool {
        !self.locked.replace(true)
    }

    unsafe fn unlock(&self) {
        assert!(self.locked.get(), "TestMutex: unlocked while free");
        self.locked.set(false);
    }
}

/// Lock-state inspection over every policy used in the tests.
pub trait Inspect {
    fn is_unlocked(&self) -> bool;
    fn is_read_locked(&self) -> bool;
    fn is_write_locked(&self) -> bool;
}

impl Inspect for OneThread {
    fn is_unlocked(&self) -> bool {
        OneThread::is_unlocked(self)
    }

    fn is_read_locked(&self) -> bool {
        OneThread::is_read_locked(self)
    }

    fn is_write_locked(&self) -> bool {
        OneThread::is_write_locked(self)
    }
}

// One lock: read and write tokens are indistinguishable.
impl Inspect for Primitive<TestMutex> {
    fn is_unlocked(&self) -> bool {
        !self.raw().locked.get()
    }

    fn is_read_locked(&self) -> bool {
        self.raw().locked.get()
    }

    fn is_write_locked(&self) -> bool {
        self.raw().locked.get()
    }
}

impl Inspect for ReadWrite<TestRwLock> {
    fn is_unlocked(&self) -> bool {
        self.raw().state() == LockState::Unlocked
    }

    fn is_read_locked(&self) -> bool {
        self.raw().state() == LockState::ReadLocked
    }

    fn is_write_locked(&self) -> bool {
        self.raw().state() == LockState::WriteLocked
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Foo {
    pub x: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Doo {
    pub base: Foo,
    pub y: i32,
}

derived!(Doo => Foo, base);
