//! Telemetry frame and its text encoding
//!
//! The frame is the per-channel aggregate the whole pipeline converges on:
//! one slot per sensor holding the last successfully computed median. Slots
//! are never reset; when a channel produces no new median its slot simply
//! stays at the previous value (staleness over backlog).
//!
//! The text encoding is a single-line JSON record whose only load-bearing
//! field is the `d` key with exactly [`SENSOR_COUNT`] numbers. The matching
//! decoder is a minimal extractor, not a JSON parser: it locates the key and
//! the bracketed list and parses the comma-separated tokens. Any deviation
//! from that shape skips the record; malformed input is never an error.

use std::fmt::Write as _;

/// Number of sensor channels; fixed for the whole process.
pub const SENSOR_COUNT: usize = 5;

/// Latest smoothed distance per channel, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryFrame {
    pub dist_m: [f32; SENSOR_COUNT],
}

impl TelemetryFrame {
    /// Encode as the bare record: `{"d":[d0,d1,d2,d3,d4]}`.
    pub fn to_json(&self) -> String {
        let mut out = String::from("{\"d\":[");
        for (i, d) in self.dist_m.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}", d);
        }
        out.push_str("]}");
        out
    }

    /// Encode wrapped for a log sink: `{"ts_ns":N,"data":{"d":[..]}}`.
    pub fn to_jsonl(&self, ts_ns: u64) -> String {
        format!("{{\"ts_ns\":{},\"data\":{}}}", ts_ns, self.to_json())
    }
}

/// Extract the `d` array from one line of text.
///
/// Finds the `"d"` key, the first `[` after it and the `]` closing it, then
/// parses the comma-separated tokens as floats. Returns `None` when the key
/// or brackets are missing, a token does not parse, or the token count is
/// not exactly [`SENSOR_COUNT`].
pub fn parse_distances(line: &str) -> Option<[f32; SENSOR_COUNT]> {
    let key = line.find("\"d\"")?;
    let open = key + line[key..].find('[')?;
    let close = open + line[open..].find(']')?;
    let body = &line[open + 1..close];

    let mut out = [0.0f32; SENSOR_COUNT];
    let mut count = 0usize;
    for token in body.split(',') {
        if count == SENSOR_COUNT {
            return None;
        }
        out[count] = token.trim().parse().ok()?;
        count += 1;
    }
    (count == SENSOR_COUNT).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let frame = TelemetryFrame {
            dist_m: [1.0, 2.5, 0.0, 3.75, 9.9],
        };
        assert_eq!(frame.to_json(), "{\"d\":[1,2.5,0,3.75,9.9]}");
    }

    #[test]
    fn jsonl_envelope() {
        let frame = TelemetryFrame::default();
        assert_eq!(
            frame.to_jsonl(42),
            "{\"ts_ns\":42,\"data\":{\"d\":[0,0,0,0,0]}}"
        );
    }

    #[test]
    fn text_round_trip() {
        let frame = TelemetryFrame {
            dist_m: [1.0, 2.5, 0.0, 3.75, 9.9],
        };
        let parsed = parse_distances(&frame.to_json()).unwrap();
        for (a, b) in parsed.iter().zip(frame.dist_m.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn parses_nested_record() {
        let line = "{\"ts_ns\":17,\"data\":{\"d\":[1,2,3,4,5]}}";
        assert_eq!(parse_distances(line), Some([1.0, 2.0, 3.0, 4.0, 5.0]));
    }

    #[test]
    fn parses_with_whitespace() {
        let line = "{\"d\": [ 0.1, 0.2 ,0.3, 0.4, 0.5 ]}";
        assert_eq!(parse_distances(line), Some([0.1, 0.2, 0.3, 0.4, 0.5]));
    }

    #[test]
    fn skips_missing_key() {
        assert_eq!(parse_distances("{\"x\":[1,2,3,4,5]}"), None);
        assert_eq!(parse_distances("garbage"), None);
    }

    #[test]
    fn skips_unbalanced_brackets() {
        assert_eq!(parse_distances("{\"d\":[1,2,3,4,5"), None);
        assert_eq!(parse_distances("{\"d\":1,2,3,4,5]}"), None);
    }

    #[test]
    fn skips_bad_token() {
        assert_eq!(parse_distances("{\"d\":[1,2,x,4,5]}"), None);
        assert_eq!(parse_distances("{\"d\":[1,2,,4,5]}"), None);
    }

    #[test]
    fn skips_wrong_count() {
        assert_eq!(parse_distances("{\"d\":[1,2,3,4]}"), None);
        assert_eq!(parse_distances("{\"d\":[1,2,3,4,5,6]}"), None);
        assert_eq!(parse_distances("{\"d\":[]}"), None);
    }
}
