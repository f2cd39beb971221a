// =============================================================================
// parser/mod.rs - Parsing Module: Event Type, Trait and Factory
// =============================================================================
//
// One raw log line goes in, one `TrafficEvent` (or nothing) comes out.
//
// DESIGN:
//
// 1. TRAIT + FACTORY
//    Every supported log format implements `LineParser`. The orchestrator only
//    ever sees `Box<dyn LineParser>`, so the concrete format is picked at
//    runtime from `config.toml` (`[input] format = "tcpdump"`).
//
// 2. NO ERRORS FOR BAD LINES
//    A line that does not match is not exceptional. `parse` returns `None`
//    and the caller counts it as processed but not parsed. Only building a
//    parser can fail (unknown format, invalid pattern).
//
// 3. SEND + SYNC
//    The analysis runs on a worker thread, so parsers must be movable across
//    threads. `Regex` is Send + Sync, which makes the concrete parsers so too.
//
// =============================================================================

pub mod tcpdump;

use std::fmt;
use thiserror::Error;

/// One captured packet header, as extracted from a log line.
///
/// Addresses are kept as opaque strings: the input grammar accepts any digit
/// run as an octet, so `999.1.1.1` is a valid (if odd) host identifier here.
/// All fields are owned so the event outlives the line buffer it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficEvent {
    /// Capture time in seconds. Monotonic within one capture, but the input
    /// as a whole is not guaranteed to be sorted.
    pub timestamp: f64,
    pub source_address: String,
    pub source_port: u64,
    pub dest_address: String,
    /// The port counted by the scan detector.
    pub dest_port: u64,
}

impl fmt::Display for TrafficEvent {
    /// Formats the event back into tcpdump shape.
    ///
    /// The timestamp is written with the shortest digits that parse back to
    /// the same f64, never in exponent form, and always with a fractional
    /// part (`1.0`, `0.1234567`, `0.00001`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = self.timestamp.to_string();
        let fraction = if timestamp.contains('.') { "" } else { ".0" };
        write!(
            f,
            "{}{} {}.{} > {}.{}:",
            timestamp,
            fraction,
            self.source_address,
            self.source_port,
            self.dest_address,
            self.dest_port
        )
    }
}

/// Contract for every log format parser.
pub trait LineParser: Send + Sync {
    /// Parses one line. `None` means "not a record of this format".
    fn parse(&self, line: &str) -> Option<TrafficEvent>;

    /// Human readable parser name (for display).
    fn name(&self) -> &str;

    /// A sample of a valid line (for debug diagnostics).
    fn expected_format(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("unknown input format '{0}'. Valid options: tcpdump")]
    UnknownFormat(String),

    #[error("invalid line pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Builds the parser for the configured input format.
pub fn create_parser(format: &str) -> Result<Box<dyn LineParser>, ParserError> {
    match format {
        "tcpdump" => Ok(Box::new(tcpdump::TcpdumpParser::new()?)),
        other => Err(ParserError::UnknownFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_parser() {
        let parser = create_parser("tcpdump").unwrap();
        assert_eq!(parser.name(), "tcpdump (text)");
    }

    #[test]
    fn test_create_unknown_parser() {
        let err = create_parser("pcapng").err().unwrap();
        assert!(matches!(err, ParserError::UnknownFormat(ref f) if f == "pcapng"));
    }

    #[test]
    fn test_display_is_tcpdump_shaped() {
        let event = TrafficEvent {
            timestamp: 1.5,
            source_address: "10.0.0.1".to_string(),
            source_port: 1234,
            dest_address: "10.0.0.2".to_string(),
            dest_port: 22,
        };
        assert_eq!(event.to_string(), "1.5 10.0.0.1.1234 > 10.0.0.2.22:");
    }

    #[test]
    fn test_display_timestamp_always_has_fraction() {
        let mut event = TrafficEvent {
            timestamp: 2.0,
            source_address: "10.0.0.1".to_string(),
            source_port: 1,
            dest_address: "10.0.0.2".to_string(),
            dest_port: 22,
        };
        assert!(event.to_string().starts_with("2.0 "));

        event.timestamp = 0.00001;
        assert!(event.to_string().starts_with("0.00001 "), "Got {}", event);

        event.timestamp = 1e17;
        assert!(event.to_string().starts_with("100000000000000000.0 "), "Got {}", event);
    }
}
