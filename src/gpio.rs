//! GPIO edge capture
//!
//! Wraps one GPIO line requested for both-edge events through the character
//! device uAPI. The kernel timestamps every edge at interrupt time, so the
//! readings do not depend on userspace scheduling latency.
//!
//! The line request is an exclusively-owned kernel resource: [`EdgeSource`]
//! is not clonable and releases the request when dropped, on every exit path.

use std::os::unix::io::{AsRawFd, RawFd};

use gpiocdev::line::{EdgeDetection, EdgeKind};
use gpiocdev::Request;

use crate::Result;

/// Direction of a logic-level transition on a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// One captured edge: direction plus the kernel's monotonic timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeStamp {
    pub edge: Edge,
    /// Monotonic timestamp in nanoseconds, stamped by the kernel.
    pub timestamp_ns: u64,
}

/// One GPIO line delivering edge events.
///
/// Construction requests the line for both edge directions; any failure to
/// open the chip or arm the request is fatal to startup. The event file
/// descriptor is exposed through [`AsRawFd`] so callers can multiplex
/// readiness across several sources before draining them.
pub struct EdgeSource {
    request: Request,
    offset: u32,
}

impl EdgeSource {
    /// Open `line` on the chip at `chip` and request both-edge events.
    pub fn open(chip: &str, line: u32, consumer: &str) -> Result<Self> {
        let request = Request::builder()
            .on_chip(chip)
            .with_consumer(consumer)
            .with_line(line)
            .with_edge_detection(EdgeDetection::BothEdges)
            .request()?;
        Ok(Self {
            request,
            offset: line,
        })
    }

    /// Line offset this source was opened on.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Read one pending edge without blocking.
    ///
    /// Returns `Ok(None)` when no event is queued. Any other failure is a
    /// real device error and is propagated.
    pub fn next_edge(&mut self) -> Result<Option<EdgeStamp>> {
        if !self.request.has_edge_event()? {
            return Ok(None);
        }
        let event = self.request.read_edge_event()?;
        let edge = match event.kind {
            EdgeKind::Rising => Edge::Rising,
            EdgeKind::Falling => Edge::Falling,
        };
        Ok(Some(EdgeStamp {
            edge,
            timestamp_ns: event.timestamp_ns,
        }))
    }
}

impl AsRawFd for EdgeSource {
    fn as_raw_fd(&self) -> RawFd {
        self.request.as_raw_fd()
    }
}
