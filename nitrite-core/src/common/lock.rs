use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};

#[derive(Default)]
struct LockState {
    writer: Option<ThreadId>,
    write_holds: usize,
    readers: HashMap<ThreadId, usize>,
    waiting_writers: usize,
}

/// A read/write lock that the owning thread may re-enter.
///
/// - a thread holding the write lock may take the write or read lock again;
/// - a thread holding a read lock may take another read lock even while a
///   writer is queued, otherwise it would wait on itself;
/// - a thread that is the *only* reader may upgrade to the write lock.
///
/// New readers from other threads queue behind waiting writers. Fairness beyond
/// that is whatever the condvar gives.
struct ReentrantRwLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl ReentrantRwLock {
    fn new() -> Self {
        ReentrantRwLock {
            state: Mutex::new(LockState::default()),
            changed: Condvar::new(),
        }
    }

    fn lock_read(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            let reentrant = state.writer == Some(me) || state.readers.contains_key(&me);
            if reentrant || (state.writer.is_none() && state.waiting_writers == 0) {
                *state.readers.entry(me).or_insert(0) += 1;
                return;
            }
            self.changed.wait(&mut state);
        }
    }

    fn unlock_read(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if let Some(count) = state.readers.get_mut(&me) {
            *count -= 1;
            if *count == 0 {
                state.readers.remove(&me);
            }
        }
        drop(state);
        self.changed.notify_all();
    }

    fn lock_write(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.writer == Some(me) {
            state.write_holds += 1;
            return;
        }

        state.waiting_writers += 1;
        loop {
            let other_readers = state.readers.keys().any(|id| *id != me);
            if state.writer.is_none() && !other_readers {
                state.waiting_writers -= 1;
                state.writer = Some(me);
                state.write_holds = 1;
                return;
            }
            self.changed.wait(&mut state);
        }
    }

    fn unlock_write(&self) {
        let mut state = self.state.lock();
        state.write_holds = state.write_holds.saturating_sub(1);
        if state.write_holds == 0 {
            state.writer = None;
        }
        drop(state);
        self.changed.notify_all();
    }

    fn is_write_locked_by_current_thread(&self) -> bool {
        self.state.lock().writer == Some(thread::current().id())
    }
}

/// Holds a shared lock until dropped. Must be dropped on the acquiring thread.
pub struct ReadGuard {
    lock: Arc<ReentrantRwLock>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

/// Holds the exclusive lock until dropped. Must be dropped on the acquiring thread.
pub struct WriteGuard {
    lock: Arc<ReentrantRwLock>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

/// A shareable handle to one named reentrant read/write lock.
#[derive(Clone)]
pub struct LockHandle {
    lock: Arc<ReentrantRwLock>,
}

impl LockHandle {
    fn new() -> Self {
        LockHandle {
            lock: Arc::new(ReentrantRwLock::new()),
        }
    }

    /// Blocks until a shared lock is held.
    pub fn read(&self) -> ReadGuard {
        self.lock.lock_read();
        ReadGuard {
            lock: self.lock.clone(),
            _not_send: PhantomData,
        }
    }

    /// Blocks until the exclusive lock is held.
    pub fn write(&self) -> WriteGuard {
        self.lock.lock_write();
        WriteGuard {
            lock: self.lock.clone(),
            _not_send: PhantomData,
        }
    }

    pub fn is_write_locked_by_current_thread(&self) -> bool {
        self.lock.is_write_locked_by_current_thread()
    }

    /// Returns `true` when both handles refer to the same underlying lock.
    pub fn same_lock(&self, other: &LockHandle) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }
}

/// Registry of named locks, one per collection name.
///
/// Locks are created on first request and kept for the lifetime of the
/// registry. Concurrent first requests for a name resolve to the same lock.
///
/// ```
/// use nitrite_core::common::LockService;
///
/// let service = LockService::new();
/// {
///     let _read = service.acquire_read("users");
///     let _again = service.acquire_read("users");
/// }
/// let _write = service.acquire_write("users");
/// ```
#[derive(Clone, Default)]
pub struct LockService {
    locks: Arc<RwLock<HashMap<String, LockHandle>>>,
}

impl LockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_lock(&self, name: &str) -> LockHandle {
        if let Some(handle) = self.locks.read().get(name) {
            return handle.clone();
        }

        let mut locks = self.locks.write();
        locks
            .entry(name.to_string())
            .or_insert_with(LockHandle::new)
            .clone()
    }

    pub fn acquire_read(&self, name: &str) -> ReadGuard {
        self.get_lock(name).read()
    }

    pub fn acquire_write(&self, name: &str) -> WriteGuard {
        self.get_lock(name).write()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.read().len()
    }
}
