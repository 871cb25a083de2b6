//! Lightweight global metrics for XaslLog.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - XASL flatten (вызовы, ошибки, узлы, дедупликация, байты потока, рост арены)
//! - Prior log (записи, байты, zip/diff, дренажи, демон, страницы, тома)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- XASL -----
static XASL_FLATTEN_CALLS: AtomicU64 = AtomicU64::new(0);
static XASL_FLATTEN_FAILURES: AtomicU64 = AtomicU64::new(0);
static XASL_NODES_SAVED: AtomicU64 = AtomicU64::new(0);
static XASL_DEDUP_HITS: AtomicU64 = AtomicU64::new(0);
static XASL_STREAM_BYTES: AtomicU64 = AtomicU64::new(0);
static XASL_ARENA_GROWTHS: AtomicU64 = AtomicU64::new(0);

// ----- Prior log -----
static LOG_PRIOR_RECORDS: AtomicU64 = AtomicU64::new(0);
static LOG_PRIOR_BYTES: AtomicU64 = AtomicU64::new(0);
static LOG_ZIP_ATTEMPTS: AtomicU64 = AtomicU64::new(0);
static LOG_ZIP_SUCCESSES: AtomicU64 = AtomicU64::new(0);
static LOG_DIFF_RECORDS: AtomicU64 = AtomicU64::new(0);
static LOG_SYNC_DRAINS: AtomicU64 = AtomicU64::new(0);
static LOG_DAEMON_WAKEUPS: AtomicU64 = AtomicU64::new(0);
static LOG_PAGES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static LOG_VOLUME_FLUSHES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // XASL
    pub xasl_flatten_calls: u64,
    pub xasl_flatten_failures: u64,
    pub xasl_nodes_saved: u64,
    pub xasl_dedup_hits: u64,
    pub xasl_stream_bytes: u64,
    pub xasl_arena_growths: u64,

    // Prior log
    pub log_prior_records: u64,
    pub log_prior_bytes: u64,
    pub log_zip_attempts: u64,
    pub log_zip_successes: u64,
    pub log_diff_records: u64,
    pub log_sync_drains: u64,
    pub log_daemon_wakeups: u64,
    pub log_pages_written: u64,
    pub log_volume_flushes: u64,
}

impl MetricsSnapshot {
    /// Доля обращений к узлам, разрешённых через visited-кэш.
    pub fn dedup_ratio(&self) -> f64 {
        let total = self.xasl_nodes_saved + self.xasl_dedup_hits;
        if total == 0 {
            0.0
        } else {
            self.xasl_dedup_hits as f64 / total as f64
        }
    }

    pub fn zip_success_ratio(&self) -> f64 {
        if self.log_zip_attempts == 0 {
            0.0
        } else {
            self.log_zip_successes as f64 / self.log_zip_attempts as f64
        }
    }
}

// ----- Recorders (XASL) -----
pub fn record_xasl_flatten(ok: bool, stream_len: usize) {
    XASL_FLATTEN_CALLS.fetch_add(1, Ordering::Relaxed);
    if ok {
        XASL_STREAM_BYTES.fetch_add(stream_len as u64, Ordering::Relaxed);
    } else {
        XASL_FLATTEN_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_xasl_node_saved() {
    XASL_NODES_SAVED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_xasl_dedup_hit() {
    XASL_DEDUP_HITS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_xasl_arena_growth() {
    XASL_ARENA_GROWTHS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Prior log) -----
pub fn record_prior_record(bytes: usize) {
    LOG_PRIOR_RECORDS.fetch_add(1, Ordering::Relaxed);
    LOG_PRIOR_BYTES.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_zip_attempt(ok: bool) {
    LOG_ZIP_ATTEMPTS.fetch_add(1, Ordering::Relaxed);
    if ok {
        LOG_ZIP_SUCCESSES.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_diff_record() {
    LOG_DIFF_RECORDS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sync_drain() {
    LOG_SYNC_DRAINS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_daemon_wakeup() {
    LOG_DAEMON_WAKEUPS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_pages_written(pages: usize) {
    LOG_PAGES_WRITTEN.fetch_add(pages as u64, Ordering::Relaxed);
}

pub fn record_volume_flush() {
    LOG_VOLUME_FLUSHES.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        xasl_flatten_calls: XASL_FLATTEN_CALLS.load(Ordering::Relaxed),
        xasl_flatten_failures: XASL_FLATTEN_FAILURES.load(Ordering::Relaxed),
        xasl_nodes_saved: XASL_NODES_SAVED.load(Ordering::Relaxed),
        xasl_dedup_hits: XASL_DEDUP_HITS.load(Ordering::Relaxed),
        xasl_stream_bytes: XASL_STREAM_BYTES.load(Ordering::Relaxed),
        xasl_arena_growths: XASL_ARENA_GROWTHS.load(Ordering::Relaxed),

        log_prior_records: LOG_PRIOR_RECORDS.load(Ordering::Relaxed),
        log_prior_bytes: LOG_PRIOR_BYTES.load(Ordering::Relaxed),
        log_zip_attempts: LOG_ZIP_ATTEMPTS.load(Ordering::Relaxed),
        log_zip_successes: LOG_ZIP_SUCCESSES.load(Ordering::Relaxed),
        log_diff_records: LOG_DIFF_RECORDS.load(Ordering::Relaxed),
        log_sync_drains: LOG_SYNC_DRAINS.load(Ordering::Relaxed),
        log_daemon_wakeups: LOG_DAEMON_WAKEUPS.load(Ordering::Relaxed),
        log_pages_written: LOG_PAGES_WRITTEN.load(Ordering::Relaxed),
        log_volume_flushes: LOG_VOLUME_FLUSHES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    XASL_FLATTEN_CALLS.store(0, Ordering::Relaxed);
    XASL_FLATTEN_FAILURES.store(0, Ordering::Relaxed);
    XASL_NODES_SAVED.store(0, Ordering::Relaxed);
    XASL_DEDUP_HITS.store(0, Ordering::Relaxed);
    XASL_STREAM_BYTES.store(0, Ordering::Relaxed);
    XASL_ARENA_GROWTHS.store(0, Ordering::Relaxed);

    LOG_PRIOR_RECORDS.store(0, Ordering::Relaxed);
    LOG_PRIOR_BYTES.store(0, Ordering::Relaxed);
    LOG_ZIP_ATTEMPTS.store(0, Ordering::Relaxed);
    LOG_ZIP_SUCCESSES.store(0, Ordering::Relaxed);
    LOG_DIFF_RECORDS.store(0, Ordering::Relaxed);
    LOG_SYNC_DRAINS.store(0, Ordering::Relaxed);
    LOG_DAEMON_WAKEUPS.store(0, Ordering::Relaxed);
    LOG_PAGES_WRITTEN.store(0, Ordering::Relaxed);
    LOG_VOLUME_FLUSHES.store(0, Ordering::Relaxed);
}
