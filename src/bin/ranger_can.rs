//! ISO-TP bridge
//!
//! Reads JSONL telemetry records from stdin, extracts the `d` array and
//! forwards the values as binary wire messages over ISO-TP, rate-gated with
//! last-value-wins coalescing. Lines that do not carry a well-formed array
//! of five numbers are skipped silently.
//!
//! Usage:
//!   ranger-u | ranger-can [--can-if vcan0] [--tx 0x701] [--rx 0x700]
//!                         [--rate-hz 20] [--verbose]

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::Parser;

use ranger::{parse_distances, FrameSink, IsotpEndpoint, TelemetryFrame, TransportSink};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CAN interface to bind on
    #[arg(long, default_value = "vcan0")]
    can_if: String,

    /// ISO-TP transmit identifier (us → peer)
    #[arg(long, value_parser = parse_can_id, default_value = "0x701")]
    tx: u32,

    /// ISO-TP receive identifier (peer → us)
    #[arg(long, value_parser = parse_can_id, default_value = "0x700")]
    rx: u32,

    /// Send rate limit in messages/s (0 = send as fast as lines arrive)
    #[arg(long, default_value_t = 20.0)]
    rate_hz: f64,

    /// Log every transmitted message
    #[arg(short, long)]
    verbose: bool,
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
    let args = Args::parse();

    // Transmits are logged at debug level; --verbose surfaces them.
    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    install_signal_flag();

    let endpoint = IsotpEndpoint::open(&args.can_if, args.tx, args.rx)?;
    let mut sink = TransportSink::new(endpoint, args.rate_hz);

    let t0 = Instant::now();
    let stdin = io::stdin();
    let mut line = String::new();
    while !STOP.load(Ordering::Relaxed) {
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if let Some(dist_m) = parse_distances(&line) {
                    let ts_ns = t0.elapsed().as_nanos() as u64;
                    sink.emit(ts_ns, &TelemetryFrame { dist_m })?;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
