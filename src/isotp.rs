//! ISO-TP transport endpoint
//!
//! Point-to-point delivery of one fixed-size [`WireMessage`] at a time over
//! a shared CAN bus. Segmentation, reassembly and flow control for messages
//! larger than one CAN frame are handled entirely by the kernel's ISO-TP
//! stack; this endpoint just reads and writes whole messages.
//!
//! Setup is a fixed sequence with per-step failure classes: socket open,
//! interface resolution and bind are fatal; the padding option is applied on
//! a best-effort basis and only logged when it fails.
//!
//! Sending is gated by [`RateGate`]: a frame that arrives before the minimum
//! inter-send interval has elapsed is dropped, never queued, so bus load
//! stays bounded no matter how bursty the input is. Only the freshest state
//! is ever transmitted.

use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::wire::{WireMessage, WIRE_LEN};
use crate::{RangerError, Result};

// linux/can/isotp.h values; libc does not export this header.
const CAN_ISOTP: libc::c_int = 6;
const SOL_CAN_ISOTP: libc::c_int = 100 + CAN_ISOTP; // SOL_CAN_BASE + CAN_ISOTP
const CAN_ISOTP_OPTS: libc::c_int = 1;
const CAN_ISOTP_TX_PADDING: u32 = 0x004;
const CAN_ISOTP_RX_PADDING: u32 = 0x008;

/// `struct can_isotp_options` from linux/can/isotp.h.
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct IsotpOptions {
    flags: u32,
    frame_txtime: u32,
    ext_address: u8,
    txpad_content: u8,
    rxpad_content: u8,
    rx_ext_address: u8,
}

/// `struct sockaddr_can` with the `can_addr.tp` union member selected.
/// Trailing padding brings it up to the kernel's 24-byte layout.
#[repr(C)]
struct SockaddrCanIsotp {
    can_family: libc::sa_family_t,
    can_ifindex: libc::c_int,
    rx_id: u32,
    tx_id: u32,
    _pad: [u8; 8],
}

/// Transmit side of a transport channel.
///
/// The seam exists so frame delivery can be exercised without a CAN stack;
/// [`IsotpEndpoint`] is the production implementation.
pub trait WireTx {
    /// Transmit exactly one message; failure is fatal to the caller.
    fn transmit(&mut self, msg: &WireMessage) -> Result<()>;
}

/// A bound ISO-TP socket carrying fixed-size telemetry messages.
///
/// Two communicating endpoints must use swapped identifier pairs: this
/// side's `tx_id` is the peer's `rx_id` and vice versa. The address is bound
/// once at construction and immutable afterwards.
pub struct IsotpEndpoint {
    fd: RawFd,
}

impl IsotpEndpoint {
    /// Open, configure and bind an ISO-TP channel on `ifname`.
    pub fn open(ifname: &str, tx_id: u32, rx_id: u32) -> Result<Self> {
        let fd = unsafe { libc::socket(libc::PF_CAN, libc::SOCK_DGRAM, CAN_ISOTP) };
        if fd < 0 {
            return Err(RangerError::Transport(format!(
                "opening ISO-TP socket: {}",
                std::io::Error::last_os_error()
            )));
        }
        // From here on the fd is owned; Drop closes it on every exit path.
        let endpoint = Self { fd };

        // Pad the final CAN frame of segmented messages in both directions.
        // Best effort: the endpoint works with stack defaults if this fails.
        let opts = IsotpOptions {
            flags: CAN_ISOTP_TX_PADDING | CAN_ISOTP_RX_PADDING,
            txpad_content: 0x00,
            rxpad_content: 0x00,
            ..IsotpOptions::default()
        };
        let rc = unsafe {
            libc::setsockopt(
                fd,
                SOL_CAN_ISOTP,
                CAN_ISOTP_OPTS,
                &opts as *const IsotpOptions as *const libc::c_void,
                std::mem::size_of::<IsotpOptions>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            warn!(
                "ISO-TP padding options rejected ({}); continuing with stack defaults",
                std::io::Error::last_os_error()
            );
        }

        let name = CString::new(ifname)
            .map_err(|_| RangerError::Config(format!("invalid interface name '{}'", ifname)))?;
        let ifindex = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if ifindex == 0 {
            return Err(RangerError::Transport(format!(
                "resolving CAN interface '{}': {}",
                ifname,
                std::io::Error::last_os_error()
            )));
        }

        let addr = SockaddrCanIsotp {
            can_family: libc::AF_CAN as libc::sa_family_t,
            can_ifindex: ifindex as libc::c_int,
            rx_id,
            tx_id,
            _pad: [0; 8],
        };
        let rc = unsafe {
            libc::bind(
                fd,
                &addr as *const SockaddrCanIsotp as *const libc::sockaddr,
                std::mem::size_of::<SockaddrCanIsotp>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(RangerError::Transport(format!(
                "binding ISO-TP channel on '{}' (tx {:#x}, rx {:#x}): {}",
                ifname,
                tx_id,
                rx_id,
                std::io::Error::last_os_error()
            )));
        }

        info!(ifname, tx_id, rx_id, "ISO-TP channel bound");
        Ok(endpoint)
    }

    /// Transmit exactly one message. Segmentation into CAN frames happens in
    /// the kernel; a transmit failure is unrecoverable for this endpoint.
    pub fn send(&self, msg: &WireMessage) -> Result<()> {
        let bytes = msg.encode();
        let n = unsafe {
            libc::send(
                self.fd,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
                0,
            )
        };
        if n != bytes.len() as isize {
            return Err(RangerError::Transport(format!(
                "ISO-TP send failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        debug!(seq = msg.seq, "transmitted");
        Ok(())
    }

    /// Block until one message arrives.
    ///
    /// A read of the wrong size is a malformed frame: it is logged and
    /// dropped (`Ok(None)`), and the caller's loop continues. An interrupted
    /// read also yields `Ok(None)` so a cancellation flag can be observed.
    /// Every other failure is fatal.
    pub fn recv(&self) -> Result<Option<WireMessage>> {
        // Oversized messages must be detectable, so read more than WIRE_LEN.
        let mut buf = [0u8; WIRE_LEN + 36];
        let n = unsafe {
            libc::recv(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(RangerError::Transport(format!("ISO-TP receive failed: {}", err)));
        }
        match WireMessage::decode(&buf[..n as usize]) {
            Some(msg) => Ok(Some(msg)),
            None => {
                warn!("malformed frame: {} bytes, expected {}", n, WIRE_LEN);
                Ok(None)
            }
        }
    }
}

impl WireTx for IsotpEndpoint {
    fn transmit(&mut self, msg: &WireMessage) -> Result<()> {
        self.send(msg)
    }
}

impl Drop for IsotpEndpoint {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Minimum inter-send interval with last-value-wins coalescing.
///
/// Candidates arriving before the interval has elapsed are dropped, never
/// queued. The very first candidate is always admitted since no prior send
/// is on record. A rate of 0 messages/s disables the gate.
pub struct RateGate {
    min_interval: Duration,
    last_send: Option<Instant>,
}

impl RateGate {
    /// Gate sends to at most `rate_hz` messages per second (0 = unlimited).
    pub fn new(rate_hz: f64) -> Self {
        let min_interval = if rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / rate_hz)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            last_send: None,
        }
    }

    /// Decide whether a candidate arriving at `now` may be sent; records
    /// `now` as the last send time when admitted.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_send {
            if !self.min_interval.is_zero() && now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_send = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_always_admitted() {
        let mut gate = RateGate::new(10.0);
        assert!(gate.admit(Instant::now()));
    }

    #[test]
    fn candidates_inside_the_interval_are_dropped() {
        let mut gate = RateGate::new(10.0); // 100 ms
        let t0 = Instant::now();
        assert!(gate.admit(t0));
        assert!(!gate.admit(t0 + Duration::from_millis(10)));
        assert!(!gate.admit(t0 + Duration::from_millis(99)));
        assert!(gate.admit(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn ten_hz_candidates_through_a_100ms_gate() {
        let mut gate = RateGate::new(10.0);
        let t0 = Instant::now();
        let mut sent = Vec::new();
        for i in 0..100u64 {
            let t = t0 + Duration::from_millis(i * 10);
            if gate.admit(t) {
                sent.push(i * 10);
            }
        }
        // Exactly 10 sends, at 0, 100, ..., 900 ms.
        assert_eq!(sent, vec![0, 100, 200, 300, 400, 500, 600, 700, 800, 900]);
    }

    #[test]
    fn zero_rate_means_unlimited() {
        let mut gate = RateGate::new(0.0);
        let t0 = Instant::now();
        for i in 0..10u64 {
            assert!(gate.admit(t0 + Duration::from_nanos(i)));
        }
    }

    #[test]
    fn drops_do_not_reset_the_interval() {
        let mut gate = RateGate::new(10.0);
        let t0 = Instant::now();
        assert!(gate.admit(t0));
        // A burst of dropped candidates must not push the next admit out.
        for ms in [20u64, 40, 60, 80] {
            assert!(!gate.admit(t0 + Duration::from_millis(ms)));
        }
        assert!(gate.admit(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn wire_sizes_line_up() {
        assert_eq!(std::mem::size_of::<IsotpOptions>(), 12);
        assert_eq!(std::mem::size_of::<SockaddrCanIsotp>(), 24);
    }
}
