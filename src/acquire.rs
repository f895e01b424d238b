//! Acquisition loop
//!
//! Single-threaded, cooperative core of the producer: waits with a bounded
//! timeout for readiness on any sensor line, then drains *every* pending
//! edge from *every* lane before blocking again, so a burst on one channel
//! cannot starve the others. Drained edges flow through the lane's tracker
//! and filter into the shared telemetry frame; an independent fixed-rate
//! timer hands the frame to the configured sinks.
//!
//! There is no internal locking because there is no internal concurrency:
//! each lane's state is owned exclusively by the loop. Cancellation is a
//! polled flag, checked once per iteration together with the optional run
//! duration, so shutdown latency is bounded by one iteration.

use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::filter::MedianFilter;
use crate::gpio::EdgeSource;
use crate::pulse::PulseTracker;
use crate::sink::FrameSink;
use crate::telemetry::{TelemetryFrame, SENSOR_COUNT};
use crate::{RangerError, Result};

/// Default median window per lane.
const DEFAULT_WINDOW: usize = 5;

/// One sensor channel: its edge source plus the per-channel pipeline state.
pub struct SensorLane {
    source: EdgeSource,
    tracker: PulseTracker,
    filter: MedianFilter,
}

impl SensorLane {
    /// Build a lane with the default sound speed and median window.
    pub fn new(source: EdgeSource) -> Self {
        Self {
            source,
            tracker: PulseTracker::default(),
            filter: MedianFilter::new(DEFAULT_WINDOW),
        }
    }

    /// Override the speed of sound (m/s) used for distance conversion.
    pub fn with_sound_speed(mut self, sound_speed: f64) -> Self {
        self.tracker = PulseTracker::new(sound_speed);
        self
    }

    /// Override the median window size.
    pub fn with_window(mut self, window: usize) -> Self {
        self.filter = MedianFilter::new(window);
        self
    }
}

/// Loop timing knobs.
pub struct AcquireOptions {
    /// Frame emission rate in Hz; must be positive.
    pub emit_rate_hz: f64,
    /// Stop after this long; `None` runs until cancelled.
    pub duration: Option<Duration>,
    /// Upper bound on one readiness wait.
    pub poll_timeout: Duration,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            emit_rate_hz: 10.0,
            duration: None,
            poll_timeout: Duration::from_millis(10),
        }
    }
}

/// The edge→frame event loop over all sensor lanes.
pub struct AcquireLoop {
    lanes: Vec<SensorLane>,
    frame: TelemetryFrame,
    sinks: Vec<Box<dyn FrameSink>>,
}

impl AcquireLoop {
    /// Build the loop; the lane count must match [`SENSOR_COUNT`].
    pub fn new(lanes: Vec<SensorLane>) -> Result<Self> {
        if lanes.len() != SENSOR_COUNT {
            return Err(RangerError::Config(format!(
                "expected {} sensor lanes, got {}",
                SENSOR_COUNT,
                lanes.len()
            )));
        }
        Ok(Self {
            lanes,
            frame: TelemetryFrame::default(),
            sinks: Vec::new(),
        })
    }

    /// Attach a sink receiving every emission tick.
    pub fn add_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sinks.push(sink);
    }

    /// Current frame contents.
    pub fn frame(&self) -> &TelemetryFrame {
        &self.frame
    }

    /// Run until `cancel` is set or the configured duration elapses.
    pub fn run(&mut self, opts: &AcquireOptions, cancel: &AtomicBool) -> Result<()> {
        if opts.emit_rate_hz <= 0.0 {
            return Err(RangerError::Config(format!(
                "emission rate must be positive, got {}",
                opts.emit_rate_hz
            )));
        }
        let emit_interval = Duration::from_secs_f64(1.0 / opts.emit_rate_hz);
        let timeout_ms = opts.poll_timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        let mut fds: Vec<libc::pollfd> = self
            .lanes
            .iter()
            .map(|lane| libc::pollfd {
                fd: lane.source.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        info!(
            lanes = self.lanes.len(),
            rate_hz = opts.emit_rate_hz,
            "acquisition loop started"
        );

        let t0 = Instant::now();
        let mut next_emit = t0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                info!("cancellation observed, stopping");
                break;
            }
            if let Some(limit) = opts.duration {
                if t0.elapsed() >= limit {
                    info!(?limit, "run duration elapsed, stopping");
                    break;
                }
            }

            let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err.into());
            }

            self.drain()?;

            let now = Instant::now();
            if now >= next_emit {
                let ts_ns = (now - t0).as_nanos() as u64;
                let Self { frame, sinks, .. } = self;
                for sink in sinks.iter_mut() {
                    sink.emit(ts_ns, frame)?;
                }
                next_emit += emit_interval;
            }
        }
        Ok(())
    }

    /// Drain every pending edge from every lane, in per-lane arrival order.
    fn drain(&mut self) -> Result<()> {
        let Self { lanes, frame, .. } = self;
        for (slot, lane) in frame.dist_m.iter_mut().zip(lanes.iter_mut()) {
            while let Some(stamp) = lane.source.next_edge()? {
                if let Some(pulse) = lane.tracker.on_edge(&stamp) {
                    if let Some(median) = lane.filter.push(pulse.distance_m) {
                        debug!(
                            line = lane.source.offset(),
                            median_m = median,
                            "median updated"
                        );
                        *slot = median as f32;
                    }
                }
            }
        }
        Ok(())
    }
}
