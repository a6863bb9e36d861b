use std::sync::{Arc, OnceLock};

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    pushdown_attempts: CounterVec,
    filter_conjuncts_pushed: CounterVec,
    filter_conjuncts_retained: CounterVec,
    optimize_time_seconds: HistogramVec,
    plan_nodes: GaugeVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    pub fn record_pushdown_attempt(&self, query_id: &str, outcome: &str) {
        let labels = [query_id, outcome];
        self.inner
            .pushdown_attempts
            .with_label_values(&labels)
            .inc();
    }

    pub fn record_filter_split(&self, query_id: &str, pushed: u64, retained: u64) {
        let labels = [query_id];
        self.inner
            .filter_conjuncts_pushed
            .with_label_values(&labels)
            .inc_by(pushed as f64);
        self.inner
            .filter_conjuncts_retained
            .with_label_values(&labels)
            .inc_by(retained as f64);
    }

    pub fn record_optimize_time(&self, query_id: &str, secs: f64) {
        let labels = [query_id];
        self.inner
            .optimize_time_seconds
            .with_label_values(&labels)
            .observe(secs.max(0.0));
    }

    pub fn set_plan_nodes(&self, query_id: &str, phase: &str, nodes: u64) {
        let labels = [query_id, phase];
        self.inner
            .plan_nodes
            .with_label_values(&labels)
            .set(nodes as f64);
    }

    pub fn render_prometheus(&self) -> String {
        let metric_families = self.inner.registry.gather();
        let mut out = Vec::new();
        let enc = TextEncoder::new();
        if enc.encode(&metric_families, &mut out).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInner {
    fn new() -> Self {
        let registry = Registry::new();

        let pushdown_attempts = counter_vec(
            &registry,
            "fedq_pushdown_attempts_total",
            "Whole-subtree pushdown attempts by outcome",
            &["query_id", "outcome"],
        );
        let filter_conjuncts_pushed = counter_vec(
            &registry,
            "fedq_filter_conjuncts_pushed_total",
            "Filter conjuncts routed to the remote source",
            &["query_id"],
        );
        let filter_conjuncts_retained = counter_vec(
            &registry,
            "fedq_filter_conjuncts_retained_total",
            "Filter conjuncts kept in local filters",
            &["query_id"],
        );
        let optimize_time_seconds = histogram_vec(
            &registry,
            "fedq_optimize_time_seconds",
            "Time spent rewriting one plan fragment",
            &["query_id"],
        );
        let plan_nodes = gauge_vec(
            &registry,
            "fedq_plan_nodes",
            "Plan node count by rewrite phase",
            &["query_id", "phase"],
        );

        Self {
            registry,
            pushdown_attempts,
            filter_conjuncts_pushed,
            filter_conjuncts_retained,
            optimize_time_seconds,
            plan_nodes,
        }
    }
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let c = CounterVec::new(Opts::new(name, help), labels).expect("counter vec");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn gauge_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> GaugeVec {
    let g = GaugeVec::new(Opts::new(name, help), labels).expect("gauge vec");
    registry
        .register(Box::new(g.clone()))
        .expect("register gauge");
    g
}

fn histogram_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("histogram vec");
    registry
        .register(Box::new(h.clone()))
        .expect("register histogram");
    h
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

pub fn global_metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}
