use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    hashes_pending: IntGauge,
    blocks_pending: IntGauge,
    import_outcomes: IntCounterVec,
    import_failures: IntCounter,
    import_time: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let hashes_pending = IntGauge::with_opts(Opts::new("block_queue_hashes_pending", "Number of block hashes waiting to be fetched")).unwrap();
        registry.register(Box::new(hashes_pending.clone())).unwrap();

        let blocks_pending = IntGauge::with_opts(Opts::new("block_queue_blocks_pending", "Number of downloaded blocks waiting for import")).unwrap();
        registry.register(Box::new(blocks_pending.clone())).unwrap();

        // Import
        let import_outcomes = IntCounterVec::new(
            Opts::new("block_queue_import_outcomes_total", "Total number of block imports by outcome"),
            &["outcome"],
        ).unwrap();
        registry.register(Box::new(import_outcomes.clone())).unwrap();

        let import_failures = IntCounter::with_opts(Opts::new("block_queue_import_failures_total", "Total number of block imports that errored or panicked")).unwrap();
        registry.register(Box::new(import_failures.clone())).unwrap();

        let import_time = HistogramVec::new(
            HistogramOpts::new("block_queue_import_time_seconds", "Time taken to import a block")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 1.0]),
            &[],
        ).unwrap();
        registry.register(Box::new(import_time.clone())).unwrap();

        Self {
            registry,
            hashes_pending,
            blocks_pending,
            import_outcomes,
            import_failures,
            import_time,
        }
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer).expect("failed to encode metrics");
        String::from_utf8(buffer).expect("metrics not utf8")
    }

    pub fn set_hashes_pending(&self, v: i64) {
        self.hashes_pending.set(v);
    }

    pub fn set_blocks_pending(&self, v: i64) {
        self.blocks_pending.set(v);
    }

    // Import
    pub fn inc_import_outcome(&self, outcome: &str) {
        self.import_outcomes.with_label_values(&[outcome]).inc();
    }

    pub fn inc_import_failures(&self) {
        self.import_failures.inc();
    }

    pub fn observe_import_time(&self, duration: f64) {
        self.import_time.with_label_values::<&str>(&[]).observe(duration);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<Metrics>;
