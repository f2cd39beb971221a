// =============================================================================
// aggregator.rs - Per-Source Event Tally and Ranking
// =============================================================================
//
// Counts events per source address and ranks sources by count, descending.
//
// TIE ORDER:
//   Sources with equal counts keep the order in which they first appeared in
//   the event stream. That decides who lands inside a "top 10" cut, so it has
//   to be deterministic. `SourceTally` therefore remembers insertion order
//   (Vec of entries + HashMap index) and `ranked()` uses a STABLE sort
//   (`slice::sort_by`), which never reorders equal elements.
//
// =============================================================================

use crate::parser::TrafficEvent;
use std::collections::HashMap;

/// Number of entries in the top-sources cut of an analysis result.
pub const TOP_SOURCES: usize = 10;

/// Event count per source address, iterable in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTally {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl SourceTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one event for `source`.
    pub fn record(&mut self, source: &str) {
        match self.index.get(source) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(source.to_string(), self.entries.len());
                self.entries.push((source.to_string(), 1));
            }
        }
    }

    /// Event count for `source`, if it was seen at all.
    pub fn get(&self, source: &str) -> Option<usize> {
        self.index.get(source).map(|&slot| self.entries[slot].1)
    }

    /// Number of distinct sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Entries in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.entries.iter().map(|(source, count)| (source.as_str(), *count))
    }

    /// All sources by count descending, ties in first-appearance order.
    pub fn ranked(&self) -> Vec<(String, usize)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

/// Tallies `events` and returns the tally plus the full ranking.
pub fn aggregate(events: &[TrafficEvent]) -> (SourceTally, Vec<(String, usize)>) {
    let mut tally = SourceTally::new();
    for event in events {
        tally.record(&event.source_address);
    }
    let ranked = tally.ranked();
    (tally, ranked)
}

/// The first `n` entries of a ranking (fewer if the ranking is shorter).
pub fn top_n(ranked: &[(String, usize)], n: usize) -> Vec<(String, usize)> {
    ranked.iter().take(n).cloned().collect()
}
