//! Frame sinks
//!
//! The acquisition loop hands the current [`TelemetryFrame`] to a set of
//! sinks on every emission tick. Text sinks persist or print the frame;
//! [`TransportSink`] forwards it onto the bus through the rate gate.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use tracing::trace;

use crate::isotp::{RateGate, WireTx};
use crate::telemetry::TelemetryFrame;
use crate::wire::WireMessage;
use crate::Result;

/// Consumer of emission ticks.
pub trait FrameSink {
    /// Deliver the frame current at `ts_ns` (monotonic, from loop start).
    fn emit(&mut self, ts_ns: u64, frame: &TelemetryFrame) -> Result<()>;
}

/// Prints one bare `{"d":[..]}` record per tick.
#[derive(Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSink for StdoutSink {
    fn emit(&mut self, _ts_ns: u64, frame: &TelemetryFrame) -> Result<()> {
        let mut out = io::stdout();
        writeln!(out, "{}", frame.to_json())?;
        out.flush()?;
        Ok(())
    }
}

/// Appends `{"ts_ns":N,"data":{..}}` lines to a file.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Create (truncating) the JSONL file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl FrameSink for JsonlSink {
    fn emit(&mut self, ts_ns: u64, frame: &TelemetryFrame) -> Result<()> {
        writeln!(self.writer, "{}", frame.to_jsonl(ts_ns))?;
        Ok(())
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Writes `ts_ns,d0,d1,d2,d3,d4` rows to a file, header first.
pub struct CsvSink {
    writer: BufWriter<File>,
}

impl CsvSink {
    /// Create (truncating) the CSV file at `path` and write the header.
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        write!(writer, "ts_ns")?;
        for i in 0..crate::telemetry::SENSOR_COUNT {
            write!(writer, ",d{}", i)?;
        }
        writeln!(writer)?;
        Ok(Self { writer })
    }
}

impl FrameSink for CsvSink {
    fn emit(&mut self, ts_ns: u64, frame: &TelemetryFrame) -> Result<()> {
        write!(self.writer, "{}", ts_ns)?;
        for d in &frame.dist_m {
            write!(self.writer, ",{}", d)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Forwards frames onto the transport channel.
///
/// Every tick is a send candidate; the gate drops those arriving inside the
/// minimum inter-send interval. `seq` is incremented immediately before each
/// transmitted message, so the receiver sees a gap-free count no matter how
/// many candidates were coalesced away.
pub struct TransportSink<T: WireTx> {
    tx: T,
    gate: RateGate,
    seq: u32,
}

impl<T: WireTx> TransportSink<T> {
    /// Wrap a transmitter, gating sends to `rate_hz` messages/s (0 = unlimited).
    pub fn new(tx: T, rate_hz: f64) -> Self {
        Self {
            tx,
            gate: RateGate::new(rate_hz),
            seq: 0,
        }
    }

    /// Sequence number of the last transmitted message.
    pub fn seq(&self) -> u32 {
        self.seq
    }
}

impl<T: WireTx> FrameSink for TransportSink<T> {
    fn emit(&mut self, _ts_ns: u64, frame: &TelemetryFrame) -> Result<()> {
        if !self.gate.admit(Instant::now()) {
            trace!("send candidate coalesced away");
            return Ok(());
        }
        self.seq = self.seq.wrapping_add(1);
        let msg = WireMessage {
            seq: self.seq,
            dist_m: frame.dist_m,
            status: 0,
        };
        self.tx.transmit(&msg)
    }
}
