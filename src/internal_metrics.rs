use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct InternalMetrics {
    pub(crate) discards: Counter,
    pub(crate) file_create: Counter,
    pub(crate) file_delete: Counter,
    pub(crate) file_write_failed: Counter,
}

#[derive(Default)]
pub(crate) struct Counter(AtomicU64);

impl Counter {
    pub(crate) fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sample(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
