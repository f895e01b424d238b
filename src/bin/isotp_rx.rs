//! ISO-TP receiver
//!
//! Binds the peer side of the telemetry channel (identifier pair swapped
//! relative to the producer) and prints every decoded message. Frames of
//! the wrong size are warned about and dropped; the loop continues.
//!
//! Usage:
//!   isotp-rx [--can-if vcan0] [--tx 0x700] [--rx 0x701]

use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use ranger::IsotpEndpoint;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CAN interface to bind on
    #[arg(long, default_value = "vcan0")]
    can_if: String,

    /// ISO-TP transmit identifier (us → peer)
    #[arg(long, value_parser = parse_can_id, default_value = "0x700")]
    tx: u32,

    /// ISO-TP receive identifier (peer → us)
    #[arg(long, value_parser = parse_can_id, default_value = "0x701")]
    rx: u32,
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

    let endpoint = IsotpEndpoint::open(&args.can_if, args.tx, args.rx)?;

    while !STOP.load(Ordering::Relaxed) {
        match endpoint.recv()? {
            Some(msg) => {
                let d: Vec<String> = msg.dist_m.iter().map(|v| v.to_string()).collect();
                println!("seq={} d=[{}] status={:#x}", msg.seq, d.join(","), msg.status);
            }
            // Malformed frame (already warned) or interrupted read.
            None => continue,
        }
    }
    Ok(())
}
