use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Query cache and remote store usage metrics
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub coalesced_waits: AtomicU64,
    pub invalidations: AtomicU64,
    pub remote_reads: AtomicU64,
    pub remote_writes: AtomicU64,
    pub retries: AtomicU64,
    pub errors: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_read(&self) {
        self.remote_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_write(&self) {
        self.remote_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> CacheStats {
        CacheStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            remote_reads: self.remote_reads.load(Ordering::Relaxed),
            remote_writes: self.remote_writes.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Cache metrics: hits={}, misses={}, coalesced={}, invalidations={}, reads={}, writes={}, retries={}, errors={}",
            stats.cache_hits,
            stats.cache_misses,
            stats.coalesced_waits,
            stats.invalidations,
            stats.remote_reads,
            stats.remote_writes,
            stats.retries,
            stats.errors
        );
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub coalesced_waits: u64,
    pub invalidations: u64,
    pub remote_reads: u64,
    pub remote_writes: u64,
    pub retries: u64,
    pub errors: u64,
}

/// Global metrics instance
static CACHE_METRICS: std::sync::LazyLock<CacheMetrics> =
    std::sync::LazyLock::new(CacheMetrics::new);

pub fn cache_metrics() -> &'static CacheMetrics {
    &CACHE_METRICS
}

/// Time an operation and record its duration
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
