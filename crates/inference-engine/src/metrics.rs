use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-engine tick counters. Per-tick failures land here and in the log
/// rather than on the status channel.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    ticks_started: AtomicU64,
    ticks_completed: AtomicU64,
    skipped_in_flight: AtomicU64,
    skipped_no_model: AtomicU64,
    skipped_no_frame: AtomicU64,
    transform_failures: AtomicU64,
    inference_failures: AtomicU64,
    actions_ok: AtomicU64,
    actions_failed: AtomicU64,
}

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl EngineMetrics {
    pub fn record_started(&self) {
        increment(&self.ticks_started);
    }

    pub fn record_completed(&self) {
        increment(&self.ticks_completed);
    }

    pub fn record_skipped_in_flight(&self) {
        increment(&self.skipped_in_flight);
    }

    pub fn record_skipped_no_model(&self) {
        increment(&self.skipped_no_model);
    }

    pub fn record_skipped_no_frame(&self) {
        increment(&self.skipped_no_frame);
    }

    pub fn record_transform_failure(&self) {
        increment(&self.transform_failures);
    }

    pub fn record_inference_failure(&self) {
        increment(&self.inference_failures);
    }

    pub fn record_action(&self, ok: bool) {
        if ok {
            increment(&self.actions_ok);
        } else {
            increment(&self.actions_failed);
        }
    }

    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            ticks_started: self.ticks_started.load(Ordering::Relaxed),
            ticks_completed: self.ticks_completed.load(Ordering::Relaxed),
            skipped_in_flight: self.skipped_in_flight.load(Ordering::Relaxed),
            skipped_no_model: self.skipped_no_model.load(Ordering::Relaxed),
            skipped_no_frame: self.skipped_no_frame.load(Ordering::Relaxed),
            transform_failures: self.transform_failures.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            actions_ok: self.actions_ok.load(Ordering::Relaxed),
            actions_failed: self.actions_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EngineMetricsSnapshot {
    pub ticks_started: u64,
    pub ticks_completed: u64,
    pub skipped_in_flight: u64,
    pub skipped_no_model: u64,
    pub skipped_no_frame: u64,
    pub transform_failures: u64,
    pub inference_failures: u64,
    pub actions_ok: u64,
    pub actions_failed: u64,
}
