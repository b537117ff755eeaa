use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

use crate::utils::time::LatencyTimer;

/// Metrics for the exchange engine: operation latency, throughput counters
/// and book-shape gauges.
///
/// The engine itself stays metrics-free; callers wrap operations with the
/// `time_*` helpers and feed counters from the event stream.
#[derive(Debug)]
pub struct EngineMetrics {
    insert_latency: LatencyTracker,
    delete_latency: LatencyTracker,

    orders_inserted: AtomicU64,
    orders_deleted: AtomicU64,
    inserts_rejected: AtomicU64,
    deletes_rejected: AtomicU64,
    best_price_updates: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        describe_counter!("exchange_orders_total", "Total orders processed");
        describe_counter!("exchange_rejects_total", "Total rejected operations");
        describe_counter!(
            "exchange_best_price_updates_total",
            "Total top-of-book changes published"
        );
        describe_histogram!(
            "exchange_operation_duration_seconds",
            "Duration of engine operations"
        );
        describe_gauge!("exchange_orders_resting", "Orders currently resting");
        describe_gauge!("exchange_levels_total", "Price levels in the book");
        describe_gauge!("exchange_best_bid", "Current best bid price");
        describe_gauge!("exchange_best_ask", "Current best ask price");

        Self {
            insert_latency: LatencyTracker::new("insert_order"),
            delete_latency: LatencyTracker::new("delete_order"),
            orders_inserted: AtomicU64::new(0),
            orders_deleted: AtomicU64::new(0),
            inserts_rejected: AtomicU64::new(0),
            deletes_rejected: AtomicU64::new(0),
            best_price_updates: AtomicU64::new(0),
        }
    }

    pub fn time_insert_order<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.insert_latency.time(f)
    }

    pub fn time_delete_order<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.delete_latency.time(f)
    }

    pub fn increment_orders_inserted(&self) {
        self.orders_inserted.fetch_add(1, Ordering::Relaxed);
        counter!("exchange_orders_total", "operation" => "insert").increment(1);
    }

    pub fn increment_orders_deleted(&self) {
        self.orders_deleted.fetch_add(1, Ordering::Relaxed);
        counter!("exchange_orders_total", "operation" => "delete").increment(1);
    }

    pub fn increment_inserts_rejected(&self) {
        self.inserts_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("exchange_rejects_total", "operation" => "insert").increment(1);
    }

    pub fn increment_deletes_rejected(&self) {
        self.deletes_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("exchange_rejects_total", "operation" => "delete").increment(1);
    }

    pub fn increment_best_price_updates(&self) {
        self.best_price_updates.fetch_add(1, Ordering::Relaxed);
        counter!("exchange_best_price_updates_total").increment(1);
    }

    pub fn set_resting_orders(&self, count: u64) {
        gauge!("exchange_orders_resting").set(count as f64);
    }

    pub fn set_bid_levels(&self, count: u64) {
        gauge!("exchange_levels_total", "side" => "bid").set(count as f64);
    }

    pub fn set_ask_levels(&self, count: u64) {
        gauge!("exchange_levels_total", "side" => "ask").set(count as f64);
    }

    pub fn set_best_bid(&self, price: u64) {
        gauge!("exchange_best_bid").set(price as f64);
    }

    pub fn set_best_ask(&self, price: u64) {
        gauge!("exchange_best_ask").set(price as f64);
    }

    pub fn get_orders_inserted(&self) -> u64 {
        self.orders_inserted.load(Ordering::Relaxed)
    }

    pub fn get_orders_deleted(&self) -> u64 {
        self.orders_deleted.load(Ordering::Relaxed)
    }

    pub fn get_inserts_rejected(&self) -> u64 {
        self.inserts_rejected.load(Ordering::Relaxed)
    }

    pub fn get_deletes_rejected(&self) -> u64 {
        self.deletes_rejected.load(Ordering::Relaxed)
    }

    pub fn get_best_price_updates(&self) -> u64 {
        self.best_price_updates.load(Ordering::Relaxed)
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        LatencyStats {
            insert_order: self.insert_latency.get_stats(),
            delete_order: self.delete_latency.get_stats(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency tracker for one operation
#[derive(Debug)]
struct LatencyTracker {
    operation: String,
    samples: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl LatencyTracker {
    fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            samples: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let timer = LatencyTimer::start();
        let result = f();
        self.record_latency(timer.stop());
        result
    }

    fn record_latency(&self, duration: Duration) {
        let nanos = duration.as_nanos() as u64;

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);

        // Update min (with CAS loop)
        let mut current_min = self.min_nanos.load(Ordering::Relaxed);
        while nanos < current_min {
            match self.min_nanos.compare_exchange_weak(
                current_min,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(new_min) => current_min = new_min,
            }
        }

        // Update max (with CAS loop)
        let mut current_max = self.max_nanos.load(Ordering::Relaxed);
        while nanos > current_max {
            match self.max_nanos.compare_exchange_weak(
                current_max,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(new_max) => current_max = new_max,
            }
        }

        histogram!("exchange_operation_duration_seconds", "operation" => self.operation.clone())
            .record(duration.as_secs_f64());
    }

    fn get_stats(&self) -> OperationLatencyStats {
        let samples = self.samples.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        let min = self.min_nanos.load(Ordering::Relaxed);
        let max = self.max_nanos.load(Ordering::Relaxed);

        let avg = if samples > 0 { total / samples } else { 0 };

        OperationLatencyStats {
            operation: self.operation.clone(),
            samples,
            avg_nanos: avg,
            min_nanos: if min == u64::MAX { 0 } else { min },
            max_nanos: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub insert_order: OperationLatencyStats,
    pub delete_order: OperationLatencyStats,
}

#[derive(Debug, Clone)]
pub struct OperationLatencyStats {
    pub operation: String,
    pub samples: u64,
    pub avg_nanos: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
}

impl OperationLatencyStats {
    pub fn avg_micros(&self) -> f64 {
        self.avg_nanos as f64 / 1_000.0
    }

    pub fn min_micros(&self) -> f64 {
        self.min_nanos as f64 / 1_000.0
    }

    pub fn max_micros(&self) -> f64 {
        self.max_nanos as f64 / 1_000.0
    }
}

/// Background metrics reporter
pub struct MetricsReporter {
    metrics: Arc<EngineMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<EngineMetrics>, interval: Duration) -> Self {
        Self { metrics, interval }
    }

    pub async fn run(&self) {
        let mut interval = interval(self.interval);

        loop {
            interval.tick().await;

            let stats = self.metrics.get_latency_stats();

            info!(
                "Exchange metrics - Orders: +{} -{} | Rejects: {}/{} | Top changes: {} | Latency (μs): insert={:.2} delete={:.2}",
                self.metrics.get_orders_inserted(),
                self.metrics.get_orders_deleted(),
                self.metrics.get_inserts_rejected(),
                self.metrics.get_deletes_rejected(),
                self.metrics.get_best_price_updates(),
                stats.insert_order.avg_micros(),
                stats.delete_order.avg_micros()
            );
        }
    }
}
