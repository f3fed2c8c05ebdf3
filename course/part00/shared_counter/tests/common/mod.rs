#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering::SeqCst},
        Arc, Mutex,
    },
    time::Duration,
};

use shared_counter::counter::{Counter, SharedCounter};

/// Remembers how many increments had landed each time it was read.
#[derive(Debug, Default)]
pub struct ProbeCounter {
    inner: SharedCounter,
    delay: Option<Duration>,
    seen_at_get: Mutex<Vec<u64>>,
}

impl ProbeCounter {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn reads(&self) -> Vec<u64> {
        self.seen_at_get.lock().unwrap().clone()
    }
}

impl Counter for ProbeCounter {
    fn increment(&self) {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.inner.increment();
    }

    fn get(&self) -> u64 {
        let value = self.inner.get();
        self.seen_at_get.lock().unwrap().push(value);
        value
    }
}

/// Panics on exactly one increment, the `explode_at`-th one overall.
#[derive(Debug)]
pub struct ExplodingCounter {
    value: AtomicU64,
    explode_at: u64,
}

impl ExplodingCounter {
    pub fn new(explode_at: u64) -> Self {
        Self {
            value: AtomicU64::new(0),
            explode_at,
        }
    }
}

impl Counter for ExplodingCounter {
    fn increment(&self) {
        let n = self.value.fetch_add(1, SeqCst) + 1;
        if n == self.explode_at {
            panic!("counter exploded at increment {n}");
        }
    }

    fn get(&self) -> u64 {
        self.value.load(SeqCst)
    }
}

/// Every increment waits until the gate is opened.
#[derive(Debug, Clone, Default)]
pub struct GatedCounter {
    open: Arc<AtomicBool>,
    inner: Arc<SharedCounter>,
}

impl GatedCounter {
    pub fn open(&self) {
        self.open.store(true, SeqCst);
    }
}

impl Counter for GatedCounter {
    fn increment(&self) {
        while !self.open.load(SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        self.inner.increment();
    }

    fn get(&self) -> u64 {
        self.inner.get()
    }
}

/// The first increment panics, every later one waits on a gate that only the
/// test can open.
#[derive(Debug, Clone, Default)]
pub struct PanicThenStallCounter {
    calls: Arc<AtomicU64>,
    gate: GatedCounter,
}

impl PanicThenStallCounter {
    pub fn release(&self) {
        self.gate.open();
    }
}

impl Counter for PanicThenStallCounter {
    fn increment(&self) {
        if self.calls.fetch_add(1, SeqCst) == 0 {
            panic!("first worker exploded");
        }
        self.gate.increment();
    }

    fn get(&self) -> u64 {
        self.gate.get()
    }
}

pub fn parallel_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
