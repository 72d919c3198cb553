//! Metrics for blob store operations.

use std::time::Instant;

use opentelemetry::{
    metrics::{Counter, Histogram},
    KeyValue,
};

use crate::BlobError;

/// Latency and error instruments shared by the backends.
#[derive(Clone)]
pub struct BlobMetrics {
    pub operations: Histogram<f64>,
    pub errors: Counter<u64>,
}

impl Default for BlobMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobMetrics {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("blob-store");
        let operations = meter
            .f64_histogram("download_gate.blob_store.operation_duration_seconds")
            .with_description("Duration of object storage operations in seconds")
            .build();
        let errors = meter
            .u64_counter("download_gate.blob_store.errors")
            .with_description("Object storage operations that returned an error")
            .build();
        Self { operations, errors }
    }

    pub fn timer(&self, backend: &'static str, op: &'static str) -> Timer {
        Timer::start_with_labels(
            &self.operations,
            &[KeyValue::new("backend", backend), KeyValue::new("op", op)],
        )
    }

    /// Count `err` unless it is a plain NotFound, which existence checks
    /// expect.
    pub fn record_error(&self, backend: &'static str, op: &'static str, err: &BlobError) {
        if err.is_not_found() {
            return;
        }
        self.errors.add(
            1,
            &[
                KeyValue::new("backend", backend),
                KeyValue::new("op", op),
                KeyValue::new("kind", err.kind()),
            ],
        );
    }
}

/// Records the elapsed time into the histogram when dropped.
pub struct Timer {
    start: Instant,
    histogram: Histogram<f64>,
    labels: Vec<KeyValue>,
}

impl Timer {
    pub fn start_with_labels(histogram: &Histogram<f64>, labels: &[KeyValue]) -> Self {
        Self {
            start: Instant::now(),
            histogram: histogram.clone(),
            labels: labels.to_vec(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.record(duration, &self.labels);
    }
}
