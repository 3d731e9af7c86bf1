use std::time::{Duration, Instant};

/// Default lifetime of cached status page reads.
pub const DEFAULT_READ_TTL: Duration = Duration::from_secs(10);

/// A single cached value that expires after a fixed lifetime.
#[derive(Debug)]
pub struct TtlCell<T> {
    ttl: Duration,
    entry: Option<(Instant, T)>,
}

impl<T: Clone> TtlCell<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// The cached value, if it is still fresh.
    pub fn get(&self) -> Option<T> {
        match &self.entry {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    pub fn set(&mut self, value: T) {
        self.entry = Some((Instant::now(), value));
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

impl<T: Clone> Default for TtlCell<T> {
    fn default() -> Self {
        Self::new(DEFAULT_READ_TTL)
    }
}
