//! Deterministic [`Environment`] used across this crate's unit tests.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::env::Environment;

struct Inner {
    elapsed: Duration,
    wall_clock_secs: u64,
    rng_counter: u64,
}

/// A simulated environment with a manually advanced clock and a
/// deterministic (non-cryptographic) byte stream in place of real entropy.
#[derive(Clone)]
pub struct TestEnv {
    inner: Arc<Mutex<Inner>>,
}

impl TestEnv {
    /// A fresh environment, clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                elapsed: Duration::ZERO,
                wall_clock_secs: 1_700_000_000,
                rng_counter: 0,
            })),
        }
    }

    /// Advance both the monotonic clock and the wall clock by `d`.
    pub fn advance(&self, d: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.elapsed += d;
        inner.wall_clock_secs += d.as_secs();
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for TestEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        self.inner.lock().unwrap().elapsed
    }

    fn wall_clock_secs(&self) -> u64 {
        self.inner.lock().unwrap().wall_clock_secs
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let mut inner = self.inner.lock().unwrap();
        for b in buffer.iter_mut() {
            inner.rng_counter = inner.rng_counter.wrapping_add(1);
            *b = (inner.rng_counter % 256) as u8;
        }
    }
}
