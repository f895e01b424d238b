//! Binary wire format for the transport channel
//!
//! Layout, little-endian, no padding:
//!
//! ```text
//! offset 0   seq       u32
//! offset 4   dist_m    5 × f32 (IEEE-754)
//! offset 24  status    u32 (reserved, transmitted as 0)
//! ```
//!
//! Encoding and decoding walk explicit byte offsets instead of casting a
//! host struct, so the format holds regardless of the compiler's layout or
//! the host's endianness.

use crate::telemetry::SENSOR_COUNT;

/// Encoded size of one [`WireMessage`] in bytes.
pub const WIRE_LEN: usize = 4 + 4 * SENSOR_COUNT + 4;

/// One fixed-size telemetry message as it travels on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WireMessage {
    /// Strictly monotonic per endpoint; the first transmitted message
    /// carries 1.
    pub seq: u32,
    /// Channel distances in meters.
    pub dist_m: [f32; SENSOR_COUNT],
    /// Reserved; always 0 on transmit.
    pub status: u32,
}

impl WireMessage {
    /// Serialize into the fixed wire layout.
    pub fn encode(&self) -> [u8; WIRE_LEN] {
        let mut buf = [0u8; WIRE_LEN];
        buf[0..4].copy_from_slice(&self.seq.to_le_bytes());
        for (i, d) in self.dist_m.iter().enumerate() {
            let off = 4 + i * 4;
            buf[off..off + 4].copy_from_slice(&d.to_le_bytes());
        }
        buf[WIRE_LEN - 4..].copy_from_slice(&self.status.to_le_bytes());
        buf
    }

    /// Deserialize one message; rejects any buffer whose length differs
    /// from [`WIRE_LEN`].
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != WIRE_LEN {
            return None;
        }
        let seq = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let mut dist_m = [0.0f32; SENSOR_COUNT];
        for (i, d) in dist_m.iter_mut().enumerate() {
            let off = 4 + i * 4;
            *d = f32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);
        }
        let status = u32::from_le_bytes(bytes[WIRE_LEN - 4..].try_into().ok()?);
        Some(Self {
            seq,
            dist_m,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_layout_is_fixed() {
        let msg = WireMessage {
            seq: 0x0403_0201,
            dist_m: [1.0, 0.0, 0.0, 0.0, 0.0],
            status: 0,
        };
        let bytes = msg.encode();
        assert_eq!(bytes.len(), 28);
        assert_eq!(&bytes[0..4], &[0x01, 0x02, 0x03, 0x04]);
        // 1.0f32 = 0x3f800000, little-endian.
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(&bytes[24..28], &[0, 0, 0, 0]);
    }

    #[test]
    fn round_trip_is_bit_identical() {
        let msg = WireMessage {
            seq: 7,
            dist_m: [1.0, 2.5, 0.0, 3.75, 9.9],
            status: 0,
        };
        let decoded = WireMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.seq, 7);
        assert_eq!(decoded.status, 0);
        for (a, b) in decoded.dist_m.iter().zip(msg.dist_m.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let bytes = WireMessage::default().encode();
        assert!(WireMessage::decode(&bytes[..27]).is_none());
        let mut long = bytes.to_vec();
        long.push(0);
        assert!(WireMessage::decode(&long).is_none());
        assert!(WireMessage::decode(&[]).is_none());
    }
}
