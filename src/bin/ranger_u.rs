//! Acquisition daemon
//!
//! Opens the configured echo lines, runs the edge→pulse→median pipeline and
//! emits telemetry frames at a fixed rate to stdout, JSONL/CSV files and,
//! optionally, straight onto an ISO-TP channel.
//!
//! Usage:
//!   ranger-u [--chip /dev/gpiochipN] [--lines 0,1,2,3,4] [--duration SEC]
//!            [--jsonl out.jsonl] [--csv out.csv] [--rate-hz N]
//!            [--can-if vcan0 [--tx 0x701] [--rx 0x700] [--msg-rate-hz N]]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::info;

use ranger::{
    AcquireLoop, AcquireOptions, CsvSink, EdgeSource, IsotpEndpoint, JsonlSink, SensorLane,
    StdoutSink, TransportSink,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GPIO character device hosting the echo lines
    #[arg(long, default_value = "/dev/gpiochip1")]
    chip: String,

    /// Comma-separated line offsets, one per sensor
    #[arg(long, value_delimiter = ',', default_value = "0,1,2,3,4")]
    lines: Vec<u32>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value_t = 0)]
    duration: u64,

    /// Write ts_ns-wrapped frames to this JSONL file instead of stdout
    #[arg(long)]
    jsonl: Option<PathBuf>,

    /// Also write one CSV row per emission tick to this file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Frame emission rate in Hz
    #[arg(long, default_value_t = 10.0)]
    rate_hz: f64,

    /// CAN interface for direct ISO-TP emission (off when absent)
    #[arg(long)]
    can_if: Option<String>,

    /// ISO-TP transmit identifier
    #[arg(long, value_parser = parse_can_id, default_value = "0x701")]
    tx: u32,

    /// ISO-TP receive identifier
    #[arg(long, value_parser = parse_can_id, default_value = "0x700")]
    rx: u32,

    /// Transport send rate limit in messages/s (0 = unlimited)
    #[arg(long, default_value_t = 20.0)]
    msg_rate_hz: f64,
}

fn parse_can_id(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_sig: libc::c_int) {
    STOP.store(true, Ordering::Relaxed);
}

fn install_signal_flag() {
    unsafe {
        libc::signal(libc::SIGINT, on_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, on_signal as *const () as libc::sighandler_t);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    install_signal_flag();

    let mut lanes = Vec::with_capacity(args.lines.len());
    for &line in &args.lines {
        let source = EdgeSource::open(&args.chip, line, "ranger-u")?;
        lanes.push(SensorLane::new(source));
    }
    // Lines already opened are released on any failure path below.
    let mut acq = AcquireLoop::new(lanes)?;

    match &args.jsonl {
        Some(path) => {
            info!("writing JSONL to {}", path.display());
            acq.add_sink(Box::new(JsonlSink::create(path)?));
        }
        None => acq.add_sink(Box::new(StdoutSink::new())),
    }
    if let Some(path) = &args.csv {
        info!("writing CSV to {}", path.display());
        acq.add_sink(Box::new(CsvSink::create(path)?));
    }
    if let Some(ifname) = &args.can_if {
        let endpoint = IsotpEndpoint::open(ifname, args.tx, args.rx)?;
        acq.add_sink(Box::new(TransportSink::new(endpoint, args.msg_rate_hz)));
    }

    let opts = AcquireOptions {
        emit_rate_hz: args.rate_hz,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        ..Default::default()
    };
    acq.run(&opts, &STOP)?;
    Ok(())
}
