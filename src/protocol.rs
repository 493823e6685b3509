use crate::transport::Transport;
use crate::types::RawSample;
use crate::Result;

// -- Frame geometry --
pub const SYNC_BYTE: u8 = 0xAA;
pub const PREAMBLE_LEN: usize = 6;
pub const PAYLOAD_SIZE: usize = 24;
pub const FRAME_SIZE: usize = PREAMBLE_LEN + PAYLOAD_SIZE;

/// What a non-sentinel byte does to the preamble count while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResyncPolicy {
    /// Non-sentinel bytes are skipped and the count is kept. This is what the
    /// deployed rig does; after line noise it can lock onto a preamble made of
    /// scattered `0xAA` bytes.
    #[default]
    Cumulative,
    /// Only an unbroken run of sentinel bytes counts.
    Consecutive,
}

/// Decode a 24-byte payload: three little-endian f64 in x, y, z order.
pub fn decode_payload(payload: &[u8; PAYLOAD_SIZE]) -> RawSample {
    let axis = |i: usize| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&payload[i * 8..i * 8 + 8]);
        f64::from_le_bytes(bytes)
    };
    RawSample {
        x: axis(0),
        y: axis(1),
        z: axis(2),
    }
}

/// Build a complete frame (preamble + payload) as the sensor sends it.
pub fn encode_frame(sample: &RawSample) -> [u8; FRAME_SIZE] {
    let mut frame = [SYNC_BYTE; FRAME_SIZE];
    let payload = &mut frame[PREAMBLE_LEN..];
    payload[0..8].copy_from_slice(&sample.x.to_le_bytes());
    payload[8..16].copy_from_slice(&sample.y.to_le_bytes());
    payload[16..24].copy_from_slice(&sample.z.to_le_bytes());
    frame
}

/// Synchronize-then-decode over a [`Transport`].
///
/// There is no checksum: a truncated or corrupt frame is consumed as data and
/// the next scan re-aligns on whatever sentinel bytes follow.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder {
    policy: ResyncPolicy,
}

impl FrameDecoder {
    pub fn new(policy: ResyncPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ResyncPolicy {
        self.policy
    }

    /// Block until one frame has been read and decoded.
    pub fn next_sample<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<RawSample> {
        let mut count = 0;
        let mut skipped = 0usize;
        while count < PREAMBLE_LEN {
            let byte = transport.read_byte()?;
            if byte == SYNC_BYTE {
                count += 1;
            } else {
                skipped += 1;
                if self.policy == ResyncPolicy::Consecutive {
                    count = 0;
                }
            }
        }
        if skipped > 0 {
            log::debug!("Skipped {} bytes while scanning for preamble", skipped);
        }

        let mut payload = [0u8; PAYLOAD_SIZE];
        transport.read_exact(&mut payload)?;
        let sample = decode_payload(&payload);
        log::debug!("Frame: x={} y={} z={}", sample.x, sample.y, sample.z);
        Ok(sample)
    }
}
