// =============================================================================
// analysis.rs - Analysis Orchestrator
// =============================================================================
//
// Runs one analysis: lines -> parser -> events -> (detector, aggregator)
// -> AnalysisResult.
//
// EXECUTION MODEL:
//   Everything here is synchronous and single-threaded. A run owns its event
//   list, its count maps and its result, so there is nothing to lock. The
//   caller decides where the run executes (the binary moves it onto a
//   blocking worker so the terminal stays responsive).
//
// PROGRESS:
//   The progress sink is a plain `FnMut(done, total)` called synchronously.
//   It is invoked every PROGRESS_INTERVAL parsed lines and exactly once with
//   `done == total` when parsing completes, including `(0, 0)` for an empty
//   input. The sink must not block; async hosts forward it as a message.
//
// CANCELLATION:
//   Cooperative. A shared `CancelFlag` is polled every PROGRESS_INTERVAL
//   lines and before each source in the detector. A cancelled run returns
//   `AnalysisError::Cancelled` and no partial result.
//
// =============================================================================

use crate::aggregator::{self, SourceTally, TOP_SOURCES};
use crate::detector::{Detector, DetectorConfig, ScanAlert};
use crate::parser::{self, LineParser, ParserError, TrafficEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Lines between two progress notifications.
pub const PROGRESS_INTERVAL: usize = 100;

/// Shared cancellation flag. Set it from any thread to stop a running
/// analysis at its next checkpoint.
pub type CancelFlag = Arc<AtomicBool>;

/// The two numeric parameters of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisParams {
    pub time_window_secs: u64,
    pub port_threshold: usize,
}

impl From<AnalysisParams> for DetectorConfig {
    fn from(params: AnalysisParams) -> Self {
        DetectorConfig {
            time_window_secs: params.time_window_secs,
            port_threshold: params.port_threshold,
        }
    }
}

/// Outcome of one analysis run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Lines handed to the analysis (parsed or not).
    pub lines_processed: usize,
    /// Lines that produced an event.
    pub valid_events: usize,
    /// Distinct source addresses among the events.
    pub unique_sources: usize,
    /// Distinct flagged sources.
    pub port_scans_detected: usize,
    /// First TOP_SOURCES entries of the ranking.
    pub top_sources: Vec<(String, usize)>,
    /// Flagged sources, sorted.
    pub flagged_sources: Vec<String>,
    /// Full source -> event count mapping, in first-appearance order.
    pub event_counts: SourceTally,
    /// Detector evidence, one per flagged source, same order as
    /// `flagged_sources`.
    pub scan_alerts: Vec<ScanAlert>,
    /// Parameters the run used.
    pub params: AnalysisParams,
}

impl AnalysisResult {
    pub fn is_flagged(&self, source: &str) -> bool {
        self.flagged_sources
            .binary_search_by(|candidate| candidate.as_str().cmp(source))
            .is_ok()
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to read traffic file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no traffic data loaded")]
    NoData,

    #[error("analysis cancelled")]
    Cancelled,

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error("internal analysis failure: {0}")]
    Internal(String),
}

/// Runs analyses with a fixed line parser.
pub struct Analyzer {
    parser: Box<dyn LineParser>,
}

impl Analyzer {
    pub fn new(parser: Box<dyn LineParser>) -> Self {
        Self { parser }
    }

    /// Analyzer for the default tcpdump format.
    pub fn tcpdump() -> Result<Self, ParserError> {
        Ok(Self::new(parser::create_parser("tcpdump")?))
    }

    pub fn parser(&self) -> &dyn LineParser {
        self.parser.as_ref()
    }

    /// Runs a full analysis over `lines`.
    pub fn analyze<S: AsRef<str>>(
        &self,
        lines: &[S],
        params: AnalysisParams,
        progress: &mut dyn FnMut(usize, usize),
        cancel: Option<&AtomicBool>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let is_cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::Relaxed));
        let total = lines.len();

        tracing::info!(
            lines = total,
            window_secs = params.time_window_secs,
            port_threshold = params.port_threshold,
            parser = self.parser.name(),
            "analysis started"
        );

        // --- 1. Parse ---
        let mut events: Vec<TrafficEvent> = Vec::with_capacity(total);
        for (i, line) in lines.iter().enumerate() {
            if let Some(event) = self.parser.parse(line.as_ref()) {
                events.push(event);
            }

            let done = i + 1;
            if done % PROGRESS_INTERVAL == 0 {
                if is_cancelled() {
                    return Err(AnalysisError::Cancelled);
                }
                // The final (total, total) call happens after the loop, once.
                if done < total {
                    progress(done, total);
                }
            }
        }
        progress(total, total);

        tracing::debug!(
            valid = events.len(),
            skipped = total - events.len(),
            "parsing finished"
        );

        // --- 2. Detect ---
        let detector = Detector::new(params.into());
        let scan_alerts = match cancel {
            Some(flag) => detector
                .detect_alerts_cancellable(&events, flag)
                .ok_or(AnalysisError::Cancelled)?,
            None => detector.detect_alerts(&events),
        };

        // --- 3. Aggregate ---
        let (event_counts, ranked) = aggregator::aggregate(&events);
        let top_sources = aggregator::top_n(&ranked, TOP_SOURCES);

        // Alerts come sorted by source address, one per source.
        let flagged_sources: Vec<String> = scan_alerts
            .iter()
            .map(|alert| alert.source_address.clone())
            .collect();

        let result = AnalysisResult {
            lines_processed: total,
            valid_events: events.len(),
            unique_sources: event_counts.len(),
            port_scans_detected: flagged_sources.len(),
            top_sources,
            flagged_sources,
            event_counts,
            scan_alerts,
            params,
        };

        tracing::info!(
            valid_events = result.valid_events,
            unique_sources = result.unique_sources,
            port_scans = result.port_scans_detected,
            "analysis finished"
        );

        Ok(result)
    }
}

/// One-shot analysis with the tcpdump parser and an optional progress sink.
pub fn analyze<S: AsRef<str>>(
    lines: &[S],
    time_window_secs: u64,
    port_threshold: usize,
    progress: Option<&mut dyn FnMut(usize, usize)>,
) -> Result<AnalysisResult, AnalysisError> {
    let analyzer = Analyzer::tcpdump()?;
    let params = AnalysisParams {
        time_window_secs,
        port_threshold,
    };
    match progress {
        Some(sink) => analyzer.analyze(lines, params, sink, None),
        None => analyzer.analyze(lines, params, &mut |_, _| {}, None),
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn params(window: u64, threshold: usize) -> AnalysisParams {
        AnalysisParams {
            time_window_secs: window,
            port_threshold: threshold,
        }
    }

    const SCENARIO: [&str; 3] = [
        "1.0 10.0.0.1.1234 > 10.0.0.2.22:",
        "1.5 10.0.0.1.1235 > 10.0.0.2.23:",
        "2.0 10.0.0.1.1236 > 10.0.0.2.24:",
    ];

    #[test]
    fn test_scenario_flags_scanner() {
        let result = analyze(&SCENARIO, 5, 2, None).unwrap();

        assert_eq!(result.lines_processed, 3);
        assert_eq!(result.valid_events, 3);
        assert_eq!(result.unique_sources, 1);
        assert_eq!(result.port_scans_detected, 1);
        assert_eq!(result.flagged_sources, vec!["10.0.0.1"]);
        assert_eq!(result.top_sources, vec![("10.0.0.1".to_string(), 3)]);
        assert!(result.is_flagged("10.0.0.1"));
    }

    #[test]
    fn test_scenario_one_second_window() {
        // Boundary event at exactly 1.0s is kept, so the source is flagged.
        let result = analyze(&SCENARIO, 1, 2, None).unwrap();
        assert_eq!(result.flagged_sources, vec!["10.0.0.1"]);
    }

    #[test]
    fn test_invalid_lines_count_as_processed_only() {
        let lines = [
            "1.0 10.0.0.1.1234 > 10.0.0.2.22:",
            "not a valid log line",
            "1.5 10.0.0.3.1235 > 10.0.0.2.23:",
        ];
        let result = analyze(&lines, 60, 10, None).unwrap();
        assert_eq!(result.lines_processed, 3);
        assert_eq!(result.valid_events, 2);
        assert_eq!(result.unique_sources, 2);
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        let lines: [&str; 0] = [];
        let result = analyze(&lines, 60, 10, None).unwrap();

        assert_eq!(result.lines_processed, 0);
        assert_eq!(result.valid_events, 0);
        assert_eq!(result.unique_sources, 0);
        assert_eq!(result.port_scans_detected, 0);
        assert!(result.top_sources.is_empty());
        assert!(result.flagged_sources.is_empty());
        assert!(result.event_counts.is_empty());
    }

    #[test]
    fn test_all_malformed_input() {
        let lines = ["garbage", "", "  ", "1 2 3"];
        let result = analyze(&lines, 60, 10, None).unwrap();
        assert_eq!(result.lines_processed, 4);
        assert_eq!(result.valid_events, 0);
        assert_eq!(result.port_scans_detected, 0);
    }

    #[test]
    fn test_progress_ends_exactly_once_at_total() {
        for total in [0usize, 1, 99, 100, 250, 300] {
            let lines: Vec<String> = (0..total)
                .map(|i| format!("{}.0 10.0.0.1.1 > 10.0.0.2.{}:", i, i % 7))
                .collect();
            let mut calls: Vec<(usize, usize)> = Vec::new();
            let mut sink = |done: usize, all: usize| calls.push((done, all));

            analyze(&lines, 60, 10, Some(&mut sink)).unwrap();

            let completions = calls.iter().filter(|(d, t)| d == t).count();
            assert_eq!(completions, 1, "total={} calls={:?}", total, calls);
            assert_eq!(calls.last(), Some(&(total, total)));
            assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
            assert!(calls.iter().all(|(d, t)| d <= t && *t == total));
        }
    }

    #[test]
    fn test_progress_cadence() {
        let lines: Vec<String> = (0..250)
            .map(|i| format!("{}.0 10.0.0.1.1 > 10.0.0.2.80:", i))
            .collect();
        let mut calls = Vec::new();
        let mut sink = |done: usize, total: usize| calls.push((done, total));
        analyze(&lines, 60, 10, Some(&mut sink)).unwrap();
        assert_eq!(calls, vec![(100, 250), (200, 250), (250, 250)]);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let lines: Vec<String> = (0..500)
            .map(|i| {
                format!(
                    "{}.{} 10.0.{}.{}.{} > 10.0.0.1.{}:",
                    i / 3,
                    i % 10,
                    i % 3,
                    i % 5,
                    1000 + i,
                    (i * 7) % 40
                )
            })
            .collect();
        let first = analyze(&lines, 10, 5, None).unwrap();
        let second = analyze(&lines, 10, 5, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_top_sources_capped_and_ordered() {
        let mut lines = Vec::new();
        for host in 1..=15u32 {
            // host N sends N events, so the ranking is 15, 14, ..., 6.
            for i in 0..host {
                lines.push(format!("{}.0 10.0.0.{}.1 > 10.0.0.254.80:", i, host));
            }
        }
        let result = analyze(&lines, 60, 100, None).unwrap();

        assert_eq!(result.top_sources.len(), TOP_SOURCES);
        assert_eq!(result.top_sources[0], ("10.0.0.15".to_string(), 15));
        assert_eq!(result.top_sources[9], ("10.0.0.6".to_string(), 6));
        assert!(result.top_sources.windows(2).all(|w| w[0].1 >= w[1].1));
        assert_eq!(result.event_counts.len(), 15);
    }

    #[test]
    fn test_cancelled_run_returns_error() {
        let lines: Vec<String> = (0..300)
            .map(|i| format!("{}.0 10.0.0.1.1 > 10.0.0.2.80:", i))
            .collect();
        let analyzer = Analyzer::tcpdump().unwrap();
        let cancel = AtomicBool::new(true);

        let err = analyzer
            .analyze(&lines, params(60, 10), &mut |_, _| {}, Some(&cancel))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
    }

    #[test]
    fn test_unraised_cancel_flag_completes() {
        let analyzer = Analyzer::tcpdump().unwrap();
        let cancel = AtomicBool::new(false);
        let result = analyzer
            .analyze(&SCENARIO, params(5, 2), &mut |_, _| {}, Some(&cancel))
            .unwrap();
        assert_eq!(result.port_scans_detected, 1);
    }
}
