use ahash::AHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Distribution of observed values across fixed upper bounds.
#[derive(Debug)]
pub struct Histogram {
    pub buckets: Vec<f64>,
    pub counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        // f64 sum kept as bits for a lock-free add.
        let _ = self
            .sum
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        // Per-bucket counts; export accumulates them.
        if let Some(i) = self.buckets.iter().position(|b| value <= *b) {
            self.counts[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Relaxed))
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Operation latency buckets, in seconds.
pub fn default_duration_buckets() -> Vec<f64> {
    vec![
        0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
    ]
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Sorted key=value pairs distinguishing series of one metric family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut v: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        v.sort_by(|a, b| a.0.cmp(&b.0));
        Self(v)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `{key="value",key2="value2"}`, or nothing when empty.
    pub fn prometheus_str(&self) -> String {
        self.prometheus_with(None)
    }

    fn prometheus_with(&self, extra: Option<(&str, &str)>) -> String {
        let mut inner: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape(v)))
            .collect();
        if let Some((k, v)) = extra {
            inner.push(format!("{}=\"{}\"", k, v));
        }
        if inner.is_empty() {
            return String::new();
        }
        format!("{{{}}}", inner.join(","))
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

type Series<T> = RwLock<AHashMap<(String, Labels), T>>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Labelled counters and histograms, safe to share across threads.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: Series<AtomicU64>,
    histograms: Series<Histogram>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Counters -----------------------------------------------------------

    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.increment_counter_by(name, labels, 1);
    }

    pub fn increment_counter_by(&self, name: &str, labels: &[(&str, &str)], amount: u64) {
        let key = (name.to_string(), Labels::new(labels));
        {
            let map = read(&self.counters);
            if let Some(c) = map.get(&key) {
                c.fetch_add(amount, Ordering::Relaxed);
                return;
            }
        }
        let mut map = write(&self.counters);
        map.entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(amount, Ordering::Relaxed);
    }

    pub fn get_counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = (name.to_string(), Labels::new(labels));
        read(&self.counters)
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum of a counter across all of its label sets.
    pub fn counter_total(&self, name: &str) -> u64 {
        read(&self.counters)
            .iter()
            .filter(|((n, _), _)| n == name)
            .map(|(_, c)| c.load(Ordering::Relaxed))
            .sum()
    }

    // -- Histograms ---------------------------------------------------------

    /// Record into a histogram, creating it with
    /// [`default_duration_buckets`] on first use.
    pub fn record_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let key = (name.to_string(), Labels::new(labels));
        {
            let map = read(&self.histograms);
            if let Some(h) = map.get(&key) {
                h.observe(value);
                return;
            }
        }
        let mut map = write(&self.histograms);
        map.entry(key)
            .or_insert_with(|| Histogram::new(default_duration_buckets()))
            .observe(value);
    }

    /// `(count, sum)` of one histogram series.
    pub fn histogram_stats(&self, name: &str, labels: &[(&str, &str)]) -> Option<(u64, f64)> {
        let key = (name.to_string(), Labels::new(labels));
        read(&self.histograms)
            .get(&key)
            .map(|h| (h.count(), h.sum()))
    }

    // -- Export --------------------------------------------------------------

    /// Prometheus text exposition format, families sorted by name.
    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();

        {
            let map = read(&self.counters);
            let mut grouped: AHashMap<&str, Vec<(&Labels, u64)>> = AHashMap::new();
            for ((name, labels), val) in map.iter() {
                grouped
                    .entry(name.as_str())
                    .or_default()
                    .push((labels, val.load(Ordering::Relaxed)));
            }
            let mut names: Vec<&str> = grouped.keys().copied().collect();
            names.sort_unstable();
            for name in names {
                out.push_str(&format!("# TYPE {} counter\n", name));
                let mut series = grouped[name].clone();
                series.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));
                for (labels, value) in series {
                    out.push_str(&format!("{}{} {}\n", name, labels.prometheus_str(), value));
                }
            }
        }

        {
            let map = read(&self.histograms);
            let mut grouped: AHashMap<&str, Vec<(&Labels, &Histogram)>> = AHashMap::new();
            for ((name, labels), h) in map.iter() {
                grouped.entry(name.as_str()).or_default().push((labels, h));
            }
            let mut names: Vec<&str> = grouped.keys().copied().collect();
            names.sort_unstable();
            for name in names {
                out.push_str(&format!("# TYPE {} histogram\n", name));
                let mut series = grouped[name].clone();
                series.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));
                for (labels, h) in series {
                    let mut cumulative = 0u64;
                    for (i, boundary) in h.buckets.iter().enumerate() {
                        cumulative += h.counts[i].load(Ordering::Relaxed);
                        let le = boundary.to_string();
                        out.push_str(&format!(
                            "{}_bucket{} {}\n",
                            name,
                            labels.prometheus_with(Some(("le", &le))),
                            cumulative
                        ));
                    }
                    out.push_str(&format!(
                        "{}_bucket{} {}\n",
                        name,
                        labels.prometheus_with(Some(("le", "+Inf"))),
                        h.count()
                    ));
                    out.push_str(&format!("{}_sum{} {}\n", name, labels.prometheus_str(), h.sum()));
                    out.push_str(&format!(
                        "{}_count{} {}\n",
                        name,
                        labels.prometheus_str(),
                        h.count()
                    ));
                }
            }
        }

        out
    }

    pub fn export_json(&self) -> serde_json::Value {
        let series_key = |name: &String, labels: &Labels| {
            if labels.is_empty() {
                name.clone()
            } else {
                format!("{}{}", name, labels.prometheus_str())
            }
        };

        let mut counters_json = serde_json::Map::new();
        for ((name, labels), val) in read(&self.counters).iter() {
            counters_json.insert(
                series_key(name, labels),
                serde_json::json!(val.load(Ordering::Relaxed)),
            );
        }

        let mut histograms_json = serde_json::Map::new();
        for ((name, labels), h) in read(&self.histograms).iter() {
            let buckets: Vec<serde_json::Value> = h
                .buckets
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    serde_json::json!({
                        "le": b,
                        "count": h.counts[i].load(Ordering::Relaxed),
                    })
                })
                .collect();
            histograms_json.insert(
                series_key(name, labels),
                serde_json::json!({
                    "buckets": buckets,
                    "sum": h.sum(),
                    "count": h.count(),
                }),
            );
        }

        serde_json::json!({
            "counters": counters_json,
            "histograms": histograms_json,
        })
    }
}

// ---------------------------------------------------------------------------
// Global singleton
// ---------------------------------------------------------------------------

/// Process-wide collector, created on first use.
pub fn global_metrics() -> &'static MetricsCollector {
    use std::sync::OnceLock;
    static INSTANCE: OnceLock<MetricsCollector> = OnceLock::new();
    INSTANCE.get_or_init(MetricsCollector::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_split_by_labels() {
        let m = MetricsCollector::new();
        m.increment_counter("ops_total", &[("operation", "head")]);
        m.increment_counter("ops_total", &[("operation", "head")]);
        m.increment_counter_by("ops_total", &[("operation", "diff")], 5);

        assert_eq!(m.get_counter("ops_total", &[("operation", "head")]), 2);
        assert_eq!(m.get_counter("ops_total", &[("operation", "diff")]), 5);
        assert_eq!(m.get_counter("ops_total", &[("operation", "tags")]), 0);
        assert_eq!(m.counter_total("ops_total"), 7);
    }

    #[test]
    fn label_order_does_not_matter() {
        let m = MetricsCollector::new();
        m.increment_counter("c", &[("a", "1"), ("b", "2")]);
        assert_eq!(m.get_counter("c", &[("b", "2"), ("a", "1")]), 1);
    }

    #[test]
    fn histogram_tracks_count_and_sum() {
        let m = MetricsCollector::new();
        m.record_histogram("latency", &[], 0.002);
        m.record_histogram("latency", &[], 0.5);
        let (count, sum) = m.histogram_stats("latency", &[]).unwrap();
        assert_eq!(count, 2);
        assert!((sum - 0.502).abs() < 1e-9);
        assert!(m.histogram_stats("latency", &[("x", "y")]).is_none());
    }

    #[test]
    fn prometheus_export_has_types_and_series() {
        let m = MetricsCollector::new();
        m.increment_counter("ops_total", &[("operation", "head")]);
        m.record_histogram("latency_seconds", &[("operation", "head")], 0.0002);

        let out = m.export_prometheus();
        assert!(out.contains("# TYPE ops_total counter"));
        assert!(out.contains("ops_total{operation=\"head\"} 1"));
        assert!(out.contains("# TYPE latency_seconds histogram"));
        assert!(out.contains("latency_seconds_bucket{operation=\"head\",le=\"0.0005\"} 1"));
        assert!(out.contains("latency_seconds_bucket{operation=\"head\",le=\"0.0001\"} 0"));
        assert!(out.contains("latency_seconds_count{operation=\"head\"} 1"));
    }

    #[test]
    fn label_values_are_escaped() {
        let l = Labels::new(&[("path", "a\"b")]);
        assert_eq!(l.prometheus_str(), "{path=\"a\\\"b\"}");
        assert_eq!(Labels::empty().prometheus_str(), "");
    }

    #[test]
    fn json_export_groups_by_kind() {
        let m = MetricsCollector::new();
        m.increment_counter("plain", &[]);
        m.record_histogram("latency", &[], 0.01);

        let json = m.export_json();
        assert_eq!(json["counters"]["plain"], 1);
        assert_eq!(json["histograms"]["latency"]["count"], 1);
    }

    #[test]
    fn global_metrics_is_a_singleton() {
        assert!(std::ptr::eq(global_metrics(), global_metrics()));
    }
}
