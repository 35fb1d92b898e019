//! Reporter (C8, §4.7).
//!
//! Takes the finished latency array for one workload, sorts it once, and
//! derives every reported statistic from the sorted slice — the same
//! sort-once-derive-everything shape as `roughenough-server`'s
//! `metrics::latency::LatencyStats`, adapted from a percentile/mean/min/max
//! summary to the millisecond-boundary histogram this spec calls for.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Csv,
    Quiet,
    Verbose,
}

/// One millisecond boundary crossed while walking the sorted latency array:
/// "by this latency, this percentage of samples had completed".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramPoint {
    pub latency_ms: i64,
    pub cumulative_pct: f64,
}

pub struct Report {
    pub title: String,
    pub requests_finished: u64,
    pub rps: f64,
    pub histogram: Vec<HistogramPoint>,
    pub outliers: usize,
}

/// Builds a report from a workload's recorded per-request latencies
/// (microseconds, in arrival order). Sorts `latencies_us` in place.
pub fn build_report(title: &str, latencies_us: &mut [i64], maxlatency_ms: u64) -> Report {
    latencies_us.sort_unstable();
    let n = latencies_us.len();

    let sum_us: i64 = latencies_us.iter().sum();
    let rps = if sum_us > 0 {
        n as f64 / (sum_us as f64 / 1_000_000.0)
    } else {
        0.0
    };

    let maxlatency_us = (maxlatency_ms * 1000) as i64;
    let outliers = latencies_us.iter().filter(|&&l| l > maxlatency_us).count();

    let mut histogram = Vec::new();
    let mut i = 0;
    while i < n {
        let ms = latencies_us[i] / 1000;
        let mut j = i;
        while j + 1 < n && latencies_us[j + 1] / 1000 == ms {
            j += 1;
        }
        histogram.push(HistogramPoint {
            latency_ms: ms,
            cumulative_pct: (j + 1) as f64 * 100.0 / n as f64,
        });
        i = j + 1;
    }

    Report {
        title: title.to_string(),
        requests_finished: n as u64,
        rps,
        histogram,
        outliers,
    }
}

impl Report {
    pub fn render(&self, mode: OutputMode) -> String {
        match mode {
            OutputMode::Csv => format!("\"{}\",\"{:.2}\"", self.title, self.rps),
            OutputMode::Quiet => format!("{}: {:.2} requests per second", self.title, self.rps),
            OutputMode::Verbose => self.render_verbose(),
        }
    }

    fn render_verbose(&self) -> String {
        let mut out = format!("====== {} ======\n", self.title);
        out.push_str(&format!(
            "  {} requests completed in {:.3} seconds\n",
            self.requests_finished,
            if self.rps > 0.0 {
                self.requests_finished as f64 / self.rps
            } else {
                0.0
            }
        ));
        for point in &self.histogram {
            out.push_str(&format!(
                "{:.3}% <= {} milliseconds\n",
                point.cumulative_pct, point.latency_ms
            ));
        }
        out.push_str(&format!("{:.2} requests per second\n", self.rps));
        if self.outliers > 0 {
            out.push_str(&format!(
                "{} requests exceeded the latency threshold\n",
                self.outliers
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rps_is_count_over_summed_latency_seconds() {
        let mut lat = vec![1_000, 1_000, 1_000, 1_000]; // 4 * 1ms = 4ms total
        let report = build_report("PING", &mut lat, 10);
        assert_eq!(report.requests_finished, 4);
        assert!((report.rps - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn histogram_groups_by_millisecond_and_covers_last_index() {
        let mut lat = vec![500, 900, 1_200, 1_200, 5_000];
        let report = build_report("SET", &mut lat, 10);
        // ms groups: [500,900]->0ms, [1200,1200]->1ms, [5000]->5ms
        assert_eq!(report.histogram.len(), 3);
        assert_eq!(report.histogram[0].latency_ms, 0);
        assert!((report.histogram[0].cumulative_pct - 40.0).abs() < 1e-9);
        assert_eq!(report.histogram.last().unwrap().latency_ms, 5);
        assert!((report.histogram.last().unwrap().cumulative_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn outliers_counts_samples_past_threshold() {
        let mut lat = vec![1_000, 20_000, 30_000];
        let report = build_report("GET", &mut lat, 10);
        assert_eq!(report.outliers, 2);
    }

    #[test]
    fn empty_latencies_produce_zero_rps_and_empty_histogram() {
        let mut lat: Vec<i64> = Vec::new();
        let report = build_report("PING", &mut lat, 10);
        assert_eq!(report.rps, 0.0);
        assert!(report.histogram.is_empty());
    }

    #[test]
    fn csv_mode_quotes_title_and_rps() {
        let mut lat = vec![1_000];
        let report = build_report("PING_INLINE", &mut lat, 10);
        assert_eq!(report.render(OutputMode::Csv), "\"PING_INLINE\",\"1000.00\"");
    }

    #[test]
    fn quiet_mode_is_a_single_line() {
        let mut lat = vec![1_000];
        let report = build_report("PING_INLINE", &mut lat, 10);
        let line = report.render(OutputMode::Quiet);
        assert_eq!(line, "PING_INLINE: 1000.00 requests per second");
    }
}
