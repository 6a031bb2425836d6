//! Pass statistics
//!
//! Passes record counters, timings, and small histograms here; the CLI can
//! dump the collected values after a run. Recording is append-only and
//! reporting preserves insertion order, so a metrics dump reads as a trace
//! of the pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum MetricValue {
    Count(u64),
    Time(Duration),
    Histogram(BTreeMap<u64, u64>),
}

#[derive(Debug)]
pub struct Metric {
    pub name: &'static str,
    pub value: MetricValue,
}

#[derive(Debug, Default)]
pub struct Metrics {
    entries: Vec<Metric>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn count(&mut self, name: &'static str, value: u64) {
        self.entries.push(Metric {
            name,
            value: MetricValue::Count(value),
        });
    }

    pub fn time(&mut self, name: &'static str, elapsed: Duration) {
        self.entries.push(Metric {
            name,
            value: MetricValue::Time(elapsed),
        });
    }

    /// Records elapsed wall time of `f` under `name`.
    pub fn timed<R>(&mut self, name: &'static str, f: impl FnOnce(&mut Metrics) -> R) -> R {
        let start = Instant::now();
        let result = f(self);
        self.time(name, start.elapsed());
        result
    }

    /// Records a frequency table of the given samples.
    pub fn histogram(&mut self, name: &'static str, samples: impl IntoIterator<Item = u64>) {
        let mut frequencies = BTreeMap::new();
        for sample in samples {
            *frequencies.entry(sample).or_insert(0) += 1;
        }
        self.entries.push(Metric {
            name,
            value: MetricValue::Histogram(frequencies),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.entries.iter()
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for metric in &self.entries {
            write!(f, "{}: ", metric.name)?;
            match &metric.value {
                MetricValue::Count(value) => writeln!(f, "{value}")?,
                MetricValue::Time(elapsed) => {
                    let nanos = elapsed.as_nanos();
                    writeln!(f, "{}.{:06} ms", nanos / 1_000_000, nanos % 1_000_000)?
                }
                MetricValue::Histogram(frequencies) => {
                    let mut separate = false;
                    for (item, frequency) in frequencies {
                        if separate {
                            write!(f, " ")?;
                        }
                        separate = true;
                        write!(f, "[{item}]={frequency}")?;
                    }
                    writeln!(f)?
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_order_and_format() {
        let mut metrics = Metrics::new();
        metrics.count("pass.nodes", 3);
        metrics.histogram("pass.sizes", [1, 2, 2]);
        let report = metrics.to_string();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines, vec!["pass.nodes: 3", "pass.sizes: [1]=1 [2]=2"]);
    }

    #[test]
    fn test_timed_passes_through_result() {
        let mut metrics = Metrics::new();
        let value = metrics.timed("work", |_| 42);
        assert_eq!(value, 42);
        assert!(metrics.to_string().starts_with("work: "));
        assert!(metrics.to_string().contains(" ms"));
    }
}
