// =============================================================================
// lib.rs - FucaRede library
// =============================================================================
//
// Offline port scan detection over tcpdump text captures.
//
// PIPELINE:
//
//   lines ──> parser ──> TrafficEvent* ──┬──> detector   ──> flagged sources
//                                        └──> aggregator ──> counts, ranking
//                                                  │
//                       AnalysisResult <───────────┘ ──> report (CSV)
//
// Modules:
//   - parser      `LineParser` trait, `TrafficEvent`, tcpdump implementation
//   - detector    sliding window distinct-port detector
//   - aggregator  per-source event counts and ranking
//   - analysis    orchestrator, progress protocol, cancellation
//   - session     loaded input + current result, replaces any global state
//   - report      CSV writer
//   - config      config.toml model and validation
//
// The binary (main.rs) adds the terminal UI, Ctrl+C handling and CLI flags.
//
// =============================================================================

pub mod aggregator;
pub mod analysis;
pub mod config;
pub mod detector;
pub mod parser;
pub mod report;
pub mod session;

pub use analysis::{analyze, AnalysisError, AnalysisParams, AnalysisResult, Analyzer, CancelFlag};
pub use detector::{Detector, DetectorConfig, ScanAlert};
pub use parser::{create_parser, LineParser, ParserError, TrafficEvent};
pub use report::{write_report, write_report_to, ReportError};
pub use session::{AnalysisSession, LoadedInput};
