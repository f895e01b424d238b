//! Ultrasonic ranging telemetry pipeline
//!
//! This library measures distance from multiple ultrasonic rangefinders by
//! timing echo-pulse edges on GPIO lines, smooths the readings, and relays
//! them as fixed-size telemetry over a CAN ISO-TP channel.
//!
//! # Architecture
//!
//! - **EdgeSource**: one GPIO line requested for both-edge events, drained
//!   non-blockingly after a readiness wait
//! - **PulseTracker**: rising/falling edge pairs → pulse width → distance
//! - **MedianFilter**: fixed-window smoothing per channel
//! - **TelemetryFrame / WireMessage**: text and binary wire encodings
//! - **IsotpEndpoint**: point-to-point segmented transport with rate-gated,
//!   last-value-wins sends
//! - **AcquireLoop**: single-threaded poll/drain/emit loop over all channels
//!
//! # Example
//!
//! ```no_run
//! use ranger::{AcquireLoop, AcquireOptions, EdgeSource, SensorLane, StdoutSink};
//! use std::sync::atomic::AtomicBool;
//!
//! let lanes = (0u32..5)
//!     .map(|n| EdgeSource::open("/dev/gpiochip1", n, "ranger-u").map(SensorLane::new))
//!     .collect::<ranger::Result<Vec<_>>>()?;
//! let mut acq = AcquireLoop::new(lanes)?;
//! acq.add_sink(Box::new(StdoutSink::new()));
//!
//! let cancel = AtomicBool::new(false);
//! acq.run(&AcquireOptions::default(), &cancel)?;
//! # Ok::<(), ranger::RangerError>(())
//! ```

use thiserror::Error;

pub mod acquire;
pub mod filter;
pub mod gpio;
pub mod isotp;
pub mod kmod;
pub mod pulse;
pub mod sink;
pub mod telemetry;
pub mod wire;

pub use acquire::{AcquireLoop, AcquireOptions, SensorLane};
pub use filter::MedianFilter;
pub use gpio::{Edge, EdgeSource, EdgeStamp};
pub use isotp::{IsotpEndpoint, RateGate, WireTx};
pub use kmod::{KmodSource, KmodStats};
pub use pulse::{Pulse, PulseTracker};
pub use sink::{CsvSink, FrameSink, JsonlSink, StdoutSink, TransportSink};
pub use telemetry::{parse_distances, TelemetryFrame, SENSOR_COUNT};
pub use wire::{WireMessage, WIRE_LEN};

#[derive(Error, Debug)]
pub enum RangerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("GPIO error: {0}")]
    Gpio(#[from] gpiocdev::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, RangerError>;
