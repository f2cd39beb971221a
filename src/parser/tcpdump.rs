// =============================================================================
// parser/tcpdump.rs - Parser for tcpdump text output
// =============================================================================
//
// LINE FORMAT (tcpdump -tt -n, one packet per line):
//   1712345678.123456 192.168.1.10.51234 > 10.0.0.5.22: Flags [S], seq 0, ...
//
// Extracted fields:
//   - 1712345678.123456   capture timestamp (seconds, mandatory fraction)
//   - 192.168.1.10        source address
//   - 51234               source port (last dotted component)
//   - 10.0.0.5            destination address
//   - 22                  destination port (the one the detector counts)
//
// Everything after the colon (flags, seq, length) is ignored.
//
// MATCHING RULES:
//   - Anchored at the start of the trimmed line. A record preceded by other
//     text is not a record.
//   - Octets are any run of ASCII digits; no 0..=255 check.
//   - `[0-9]` instead of `\d`: in the regex crate `\d` is Unicode aware and
//     would accept digits that `str::parse` then rejects.
//   - Ports are u64 (up to 18446744073709551615). A larger value makes the
//     whole line unparseable.
//   - The timestamp must be finite. A digit run long enough to parse as
//     infinity is rejected, since window arithmetic on it yields NaN.
//
// =============================================================================

use super::{LineParser, TrafficEvent};
use regex::Regex;

const PATTERN: &str = r"^([0-9]+\.[0-9]+)\s+([0-9]+\.[0-9]+\.[0-9]+\.[0-9]+)\.([0-9]+)\s*>\s*([0-9]+\.[0-9]+\.[0-9]+\.[0-9]+)\.([0-9]+):";

/// Parser for tcpdump-style packet header lines.
///
/// Owns the compiled pattern; compiling once at construction keeps `parse`
/// to a single DFA walk per line.
pub struct TcpdumpParser {
    pattern: Regex,
}

impl TcpdumpParser {
    pub fn new() -> Result<Self, regex::Error> {
        // Groups:
        //   1: timestamp        2: source address   3: source port
        //   4: dest address     5: dest port
        //
        // The address group is greedy but fixed at four components, so in
        // "10.0.0.1.1234" the fifth component always lands in the port group.
        let pattern = Regex::new(PATTERN)?;
        Ok(Self { pattern })
    }
}

impl LineParser for TcpdumpParser {
    fn parse(&self, line: &str) -> Option<TrafficEvent> {
        let caps = self.pattern.captures(line.trim())?;

        // `?` on Option: any group that fails to convert drops the line.
        let timestamp = caps
            .get(1)?
            .as_str()
            .parse::<f64>()
            .ok()
            .filter(|t: &f64| t.is_finite())?;
        let source_address = caps.get(2)?.as_str().to_string();
        let source_port: u64 = caps.get(3)?.as_str().parse().ok()?;
        let dest_address = caps.get(4)?.as_str().to_string();
        let dest_port: u64 = caps.get(5)?.as_str().parse().ok()?;

        Some(TrafficEvent {
            timestamp,
            source_address,
            source_port,
            dest_address,
            dest_port,
        })
    }

    fn name(&self) -> &str {
        "tcpdump (text)"
    }

    fn expected_format(&self) -> &str {
        "1712345678.123456 192.168.1.10.51234 > 10.0.0.5.22: Flags [S], ..."
    }
}
