//! Reader for the kernel-resident acquisition path
//!
//! A kernel driver can own the echo-line interrupts instead of the
//! userspace edge pipeline. It exposes two read-only debugfs endpoints:
//!
//! - `distances`: one line of five comma-separated fixed-point meters
//! - `stats`: `seq=N pulses=a,b,c,d,e overruns=a,b,c,d,e`
//!
//! This module parses those endpoints so the driver can serve as an
//! alternative frame source. The core never requires it, and the orphan
//! counts it reports stay out of the telemetry frame and both wire formats.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::telemetry::SENSOR_COUNT;
use crate::{RangerError, Result};

/// Where the kernel driver mounts its endpoints by default.
pub const DEFAULT_DEBUGFS_DIR: &str = "/sys/kernel/debug/ranger_k";

/// Counters exposed by the kernel driver's `stats` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmodStats {
    /// Total edges handled, all channels.
    pub seq: u32,
    /// Successfully measured pulses per channel.
    pub pulses: [u32; SENSOR_COUNT],
    /// Falling edges with no recorded rise, per channel.
    pub orphans: [u32; SENSOR_COUNT],
}

/// Handle on the driver's debugfs directory.
pub struct KmodSource {
    dir: PathBuf,
}

impl KmodSource {
    /// Point at a debugfs directory (see [`DEFAULT_DEBUGFS_DIR`]).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read the current per-channel distances in meters.
    pub fn read_distances(&self) -> Result<[f32; SENSOR_COUNT]> {
        let text = fs::read_to_string(self.dir.join("distances"))?;
        parse_fixed_list(&text, "distance")
    }

    /// Read the driver's event counters.
    pub fn read_stats(&self) -> Result<KmodStats> {
        let text = fs::read_to_string(self.dir.join("stats"))?;
        parse_stats(&text)
    }
}

/// Parse exactly [`SENSOR_COUNT`] comma-separated values.
fn parse_fixed_list<T>(text: &str, what: &str) -> Result<[T; SENSOR_COUNT]>
where
    T: Copy + Default + FromStr,
{
    let mut out = [T::default(); SENSOR_COUNT];
    let mut count = 0usize;
    for token in text.trim().split(',') {
        if count == SENSOR_COUNT {
            return Err(RangerError::Parse(format!(
                "more than {} {} values",
                SENSOR_COUNT, what
            )));
        }
        out[count] = token.trim().parse().map_err(|_| {
            RangerError::Parse(format!("bad {} value '{}'", what, token.trim()))
        })?;
        count += 1;
    }
    if count != SENSOR_COUNT {
        return Err(RangerError::Parse(format!(
            "expected {} {} values, got {}",
            SENSOR_COUNT, what, count
        )));
    }
    Ok(out)
}

fn parse_stats(text: &str) -> Result<KmodStats> {
    let mut seq = None;
    let mut pulses = None;
    let mut orphans = None;
    for field in text.split_whitespace() {
        if let Some(v) = field.strip_prefix("seq=") {
            seq = Some(v.parse().map_err(|_| {
                RangerError::Parse(format!("bad seq value '{}'", v))
            })?);
        } else if let Some(v) = field.strip_prefix("pulses=") {
            pulses = Some(parse_fixed_list(v, "pulse count")?);
        } else if let Some(v) = field.strip_prefix("overruns=") {
            orphans = Some(parse_fixed_list(v, "overrun count")?);
        }
    }
    match (seq, pulses, orphans) {
        (Some(seq), Some(pulses), Some(orphans)) => Ok(KmodStats {
            seq,
            pulses,
            orphans,
        }),
        _ => Err(RangerError::Parse(format!(
            "incomplete stats line '{}'",
            text.trim()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_distances_line() {
        let d: [f32; SENSOR_COUNT] =
            parse_fixed_list("0.171,0.250,1.000,0.033,2.500\n", "distance").unwrap();
        assert_eq!(d, [0.171, 0.25, 1.0, 0.033, 2.5]);
    }

    #[test]
    fn rejects_short_distances_line() {
        let r: Result<[f32; SENSOR_COUNT]> = parse_fixed_list("0.1,0.2,0.3\n", "distance");
        assert!(r.is_err());
    }

    #[test]
    fn parses_stats_line() {
        let stats =
            parse_stats("seq=16 pulses=3,3,3,3,4 overruns=1,0,0,0,0\n").unwrap();
        assert_eq!(stats.seq, 16);
        assert_eq!(stats.pulses, [3, 3, 3, 3, 4]);
        assert_eq!(stats.orphans, [1, 0, 0, 0, 0]);
    }

    #[test]
    fn rejects_incomplete_stats_line() {
        assert!(parse_stats("seq=16 pulses=3,3,3,3,4\n").is_err());
        assert!(parse_stats("").is_err());
    }

    #[test]
    fn reads_through_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("distances"), "0.100,0.200,0.300,0.400,0.500\n")
            .unwrap();
        std::fs::write(
            dir.path().join("stats"),
            "seq=5 pulses=1,1,1,1,1 overruns=0,0,0,0,0\n",
        )
        .unwrap();

        let source = KmodSource::new(dir.path());
        assert_eq!(
            source.read_distances().unwrap(),
            [0.1, 0.2, 0.3, 0.4, 0.5]
        );
        assert_eq!(source.read_stats().unwrap().seq, 5);
    }
}
