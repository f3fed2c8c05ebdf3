use std::sync::{
    atomic::{AtomicU64, Ordering::SeqCst},
    Arc, Mutex,
};

/// Something many threads can bump at once and read back afterwards.
pub trait Counter: Send + Sync + 'static {
    fn increment(&self);
    fn get(&self) -> u64;
}

impl<C: Counter> Counter for Arc<C> {
    fn increment(&self) {
        C::increment(self)
    }

    fn get(&self) -> u64 {
        C::get(self)
    }
}

/// The counter the driver relies on: every increment is a single `fetch_add`,
/// so no two callers can ever observe the same pre-increment value.
#[derive(Debug, Default)]
pub struct SharedCounter {
    value: AtomicU64,
}

impl SharedCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for SharedCounter {
    fn increment(&self) {
        self.value.fetch_add(1, SeqCst);
    }

    fn get(&self) -> u64 {
        self.value.load(SeqCst)
    }
}

/// Every read and write is visible to every thread, but `increment` is a load
/// followed by a separate store. Two threads can load the same value and both
/// store `value + 1`, dropping one of the updates.
///
/// Visibility is not atomicity: this is the `volatile int counter` mistake.
#[derive(Debug, Default)]
pub struct NaiveCounter {
    value: AtomicU64,
}

impl NaiveCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for NaiveCounter {
    fn increment(&self) {
        let current = self.value.load(SeqCst);
        self.value.store(current + 1, SeqCst);
    }

    fn get(&self) -> u64 {
        self.value.load(SeqCst)
    }
}

/// Correct, but takes a lock for every single increment.
#[derive(Debug, Default)]
pub struct SynchronizedCounter {
    value: Mutex<u64>,
}

impl SynchronizedCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for SynchronizedCounter {
    fn increment(&self) {
        // a poisoned lock still holds a valid count
        let mut value = self.value.lock().unwrap_or_else(|e| e.into_inner());
        *value += 1;
    }

    fn get(&self) -> u64 {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }
}
