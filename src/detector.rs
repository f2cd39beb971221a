// =============================================================================
// detector.rs - Port Scan Detection Engine
// =============================================================================
//
// Flags source addresses that contact more than `port_threshold` distinct
// destination ports inside some sliding time window of `time_window_secs`.
//
// ALGORITHM (per source address):
//   1. Group events by source. Sources with <= port_threshold events are
//      skipped: they cannot reach threshold + 1 distinct ports no matter how
//      the events are spread in time.
//   2. Sort the group by timestamp (the input is not globally sorted).
//   3. Walk the events keeping a queue of in-window events and a reference
//      count per destination port. Before admitting an event, evict from the
//      front everything more than `time_window_secs` older than it.
//   4. A port stays "present" while at least one in-window event carries it.
//      The count map makes eviction O(1) per event instead of rescanning the
//      queue to find out whether the port is still represented.
//   5. The first time the number of present ports exceeds the threshold the
//      source is flagged and the rest of its events are skipped.
//
// Total cost: O(N log N) for the per-source sorts, O(N) for the windows.
//
// TIME COMPARISON POLICY:
//   Eviction uses exact f64 arithmetic: `newer - older > window`. There is no
//   epsilon. An event exactly `window` seconds old is still inside the window,
//   and equal timestamps never evict each other. Keeping the comparison exact
//   means results never drift with a tolerance setting.
//
// =============================================================================

use crate::parser::TrafficEvent;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

/// Detection thresholds for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Width of the sliding window, in seconds. 0 means only events with
    /// identical timestamps share a window.
    pub time_window_secs: u64,
    /// A source is flagged when a window holds MORE than this many distinct
    /// destination ports.
    pub port_threshold: usize,
}

/// Evidence for one flagged source, captured at the moment it crossed the
/// threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanAlert {
    pub source_address: String,
    /// Distinct destination ports present in the triggering window, sorted.
    pub unique_ports: Vec<u64>,
    /// Timestamp of the oldest event still in the triggering window.
    pub window_start: f64,
    /// Timestamp of the event that pushed the source over the threshold.
    pub window_end: f64,
    /// Total events seen from this source across the whole input.
    pub total_events: usize,
}

/// The port scan detector. Stateless between calls; every `detect*` call
/// works only on the events it is given.
pub struct Detector {
    config: DetectorConfig,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> DetectorConfig {
        self.config
    }

    /// Returns the set of flagged source addresses (sorted).
    pub fn detect(&self, events: &[TrafficEvent]) -> BTreeSet<String> {
        self.detect_alerts(events)
            .into_iter()
            .map(|alert| alert.source_address)
            .collect()
    }

    /// Returns one alert per flagged source, ordered by source address.
    pub fn detect_alerts(&self, events: &[TrafficEvent]) -> Vec<ScanAlert> {
        // Without a cancel flag the scan always runs to completion.
        self.scan(events, || false).unwrap_or_default()
    }

    /// Same as `detect_alerts`, but checks `cancel` before each source.
    /// Returns `None` when the flag was raised.
    pub fn detect_alerts_cancellable(
        &self,
        events: &[TrafficEvent],
        cancel: &AtomicBool,
    ) -> Option<Vec<ScanAlert>> {
        self.scan(events, || cancel.load(Ordering::Relaxed))
    }

    fn scan(&self, events: &[TrafficEvent], should_stop: impl Fn() -> bool) -> Option<Vec<ScanAlert>> {
        let mut by_source: HashMap<&str, Vec<&TrafficEvent>> = HashMap::new();
        for event in events {
            by_source
                .entry(event.source_address.as_str())
                .or_default()
                .push(event);
        }

        let mut alerts = Vec::new();
        let mut candidates = 0usize;

        for (source, mut group) in by_source {
            if should_stop() {
                tracing::debug!("port scan detection cancelled");
                return None;
            }

            // Event-count floor: fewer events than threshold + 1 can never
            // produce threshold + 1 distinct ports.
            if group.len() <= self.config.port_threshold {
                continue;
            }
            candidates += 1;

            // total_cmp gives a total order on f64; ties keep no particular
            // order, which is fine since only port membership matters.
            group.sort_unstable_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

            if let Some(alert) = self.scan_source(source, &group) {
                tracing::debug!(
                    source = %alert.source_address,
                    ports = alert.unique_ports.len(),
                    start = alert.window_start,
                    end = alert.window_end,
                    "port scan detected"
                );
                alerts.push(alert);
            }
        }

        tracing::debug!(candidates, flagged = alerts.len(), "port scan detection finished");

        // HashMap iteration order is random; sort so results are reproducible.
        alerts.sort_by(|a, b| a.source_address.cmp(&b.source_address));
        Some(alerts)
    }

    /// Slides the window over one source's time-sorted events.
    fn scan_source(&self, source: &str, sorted: &[&TrafficEvent]) -> Option<ScanAlert> {
        let mut window = PortWindow::new(self.config.time_window_secs as f64);

        for &event in sorted {
            let distinct = window.admit(event);
            if distinct > self.config.port_threshold {
                return Some(ScanAlert {
                    source_address: source.to_string(),
                    unique_ports: window.ports(),
                    window_start: window.oldest_timestamp().unwrap_or(event.timestamp),
                    window_end: event.timestamp,
                    total_events: sorted.len(),
                });
            }
        }

        None
    }
}

/// In-window events plus a reference count per destination port.
///
/// Invariant: `port_counts` holds exactly the ports of the events in
/// `events`, each with a count >= 1. Ports are removed when their count
/// drops to zero, so `port_counts.len()` is the distinct port count.
struct PortWindow<'a> {
    events: VecDeque<&'a TrafficEvent>,
    port_counts: HashMap<u64, usize>,
    width: f64,
}

impl<'a> PortWindow<'a> {
    fn new(width: f64) -> Self {
        Self {
            events: VecDeque::new(),
            port_counts: HashMap::new(),
            width,
        }
    }

    /// Evicts stale events, admits `event`, returns the distinct port count.
    fn admit(&mut self, event: &'a TrafficEvent) -> usize {
        // `&front` copies the reference out of the deque, so popping inside
        // the loop does not conflict with the borrow.
        while let Some(&front) = self.events.front() {
            if event.timestamp - front.timestamp > self.width {
                self.events.pop_front();
                self.release(front.dest_port);
            } else {
                break;
            }
        }

        self.events.push_back(event);
        *self.port_counts.entry(event.dest_port).or_insert(0) += 1;
        self.port_counts.len()
    }

    fn release(&mut self, port: u64) {
        if let Some(count) = self.port_counts.get_mut(&port) {
            *count -= 1;
            if *count == 0 {
                self.port_counts.remove(&port);
            }
        }
    }

    fn ports(&self) -> Vec<u64> {
        let mut ports: Vec<u64> = self.port_counts.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    fn oldest_timestamp(&self) -> Option<f64> {
        self.events.front().map(|e| e.timestamp)
    }
}
