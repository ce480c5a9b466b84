//! Frame validation
//!
//! Frame layout (all offsets in bytes):
//! - 0..2: header `FF FE`
//! - 2..6: mode byte per channel (mode table order)
//! - 6: charge/discharge bits, 2 bits per channel (status 1/3 table order)
//! - 7: empty bits (low nibble) and complete bits (high nibble)
//! - 8: temperature-protect flag (0x10) and repause bits
//! - 9..17: configured current, 4 x u16 LE
//! - 17..25: current, 4 x u16 LE
//! - 25..33: offline voltage, 4 x u16 LE
//! - 33..41: online voltage, 4 x u16 LE
//! - 41..57: capacity, 4 x u32 LE
//! - 57..65: elapsed minutes, 4 x u16 BE
//! - 65..73: impedance, 4 x u16 LE
//! - 73: terminator `AA`

use std::fmt::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::tables::{status_shift, value_slot, CHANNEL_COUNT};
use super::{ChargerError, FRAME_HEADER, FRAME_LEN, FRAME_TERMINATOR};

/// Byte offsets of the per-channel value families
pub mod offsets {
    /// Charge/discharge bit pairs
    pub const STATUS_ACTIVE: usize = 6;
    /// Empty (low nibble) and complete (high nibble) bits
    pub const STATUS_EMPTY_COMPLETE: usize = 7;
    /// Temperature-protect flag and repause bits
    pub const STATUS_FLAGS: usize = 8;
    /// Configured current, u16 LE
    pub const CONFIGURED_CURRENT: usize = 9;
    /// Current, u16 LE
    pub const CURRENT: usize = 17;
    /// Offline voltage, u16 LE
    pub const OFFLINE_VOLTAGE: usize = 25;
    /// Online voltage, u16 LE
    pub const ONLINE_VOLTAGE: usize = 33;
    /// Accumulated capacity, u32 LE
    pub const CAPACITY: usize = 41;
    /// Elapsed minutes, u16 BE
    pub const TIME: usize = 57;
    /// Impedance, u16 LE
    pub const IMPEDANCE: usize = 65;
}

/// Temperature-protect flag in the status flags byte
pub const TEMP_PROTECT_FLAG: u8 = 0x10;

/// One complete status frame whose header and terminator have been checked
#[derive(Clone, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Validate raw bytes as a frame.
    ///
    /// This is the authoritative boundary check for bytes from any source,
    /// including windows already picked out by [`super::FrameReader`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, ChargerError> {
        let bytes: [u8; FRAME_LEN] = data
            .try_into()
            .map_err(|_| ChargerError::InvalidLength(data.len()))?;

        if bytes[..2] != FRAME_HEADER || bytes[FRAME_LEN - 1] != FRAME_TERMINATOR {
            return Err(ChargerError::FrameFormat {
                header: [bytes[0], bytes[1]],
                terminator: bytes[FRAME_LEN - 1],
            });
        }

        Ok(Self(bytes))
    }

    /// Raw frame bytes
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Lowercase hex dump, as logged for every accepted frame
    pub fn hex(&self) -> String {
        self.0.iter().fold(String::with_capacity(FRAME_LEN * 2), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        })
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Frame").field(&self.hex()).finish()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Builder for constructing frames, e.g. for simulated devices and fixtures.
///
/// Channel arguments are logical indices; the builder places every value at
/// the channel's physical position.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    bytes: [u8; FRAME_LEN],
}

impl FrameBuilder {
    /// Create an all-zero frame with header and terminator in place
    pub fn new() -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[..2].copy_from_slice(&FRAME_HEADER);
        bytes[FRAME_LEN - 1] = FRAME_TERMINATOR;
        Self { bytes }
    }

    /// Set a raw byte
    pub fn byte(mut self, offset: usize, value: u8) -> Self {
        self.bytes[offset] = value;
        self
    }

    /// Set a channel's mode byte
    pub fn mode(self, channel: usize, mode: u8) -> Self {
        self.byte(super::tables::mode_offset(channel), mode)
    }

    /// Mark a channel as charging
    pub fn charging(mut self, channel: usize) -> Self {
        self.bytes[offsets::STATUS_ACTIVE] |= 0x01 << status_shift(channel);
        self
    }

    /// Mark a channel as discharging
    pub fn discharging(mut self, channel: usize) -> Self {
        self.bytes[offsets::STATUS_ACTIVE] |= 0x02 << status_shift(channel);
        self
    }

    /// Mark a channel's slot as empty (no cell inserted)
    pub fn empty(mut self, channel: usize) -> Self {
        self.bytes[offsets::STATUS_EMPTY_COMPLETE] |= 0x01 << channel;
        self
    }

    /// Mark a channel as complete
    pub fn complete(mut self, channel: usize) -> Self {
        self.bytes[offsets::STATUS_EMPTY_COMPLETE] |= 0x01 << (channel + 4);
        self
    }

    /// Raise the charger-wide temperature-protect flag
    pub fn temp_protect(mut self) -> Self {
        self.bytes[offsets::STATUS_FLAGS] |= TEMP_PROTECT_FLAG;
        self
    }

    /// Mark a channel as paused between refresh cycles
    pub fn repause(mut self, channel: usize) -> Self {
        self.bytes[offsets::STATUS_FLAGS] |= 0x01 << (status_shift(channel) / 2);
        self
    }

    fn put_u16_le(mut self, base: usize, channel: usize, value: u16) -> Self {
        let at = base + 2 * value_slot(channel);
        LittleEndian::write_u16(&mut self.bytes[at..at + 2], value);
        self
    }

    /// Set a channel's configured current
    pub fn configured_current(self, channel: usize, value: u16) -> Self {
        self.put_u16_le(offsets::CONFIGURED_CURRENT, channel, value)
    }

    /// Set a channel's present current
    pub fn current(self, channel: usize, value: u16) -> Self {
        self.put_u16_le(offsets::CURRENT, channel, value)
    }

    /// Set a channel's offline voltage
    pub fn offline_voltage(self, channel: usize, value: u16) -> Self {
        self.put_u16_le(offsets::OFFLINE_VOLTAGE, channel, value)
    }

    /// Set a channel's online voltage
    pub fn online_voltage(self, channel: usize, value: u16) -> Self {
        self.put_u16_le(offsets::ONLINE_VOLTAGE, channel, value)
    }

    /// Set a channel's impedance
    pub fn impedance(self, channel: usize, value: u16) -> Self {
        self.put_u16_le(offsets::IMPEDANCE, channel, value)
    }

    /// Set a channel's raw capacity counter
    pub fn capacity(mut self, channel: usize, value: u32) -> Self {
        let at = offsets::CAPACITY + 4 * value_slot(channel);
        LittleEndian::write_u32(&mut self.bytes[at..at + 4], value);
        self
    }

    /// Set a channel's elapsed minutes (big-endian on the wire)
    pub fn minutes(mut self, channel: usize, value: u16) -> Self {
        let at = offsets::TIME + 2 * value_slot(channel);
        BigEndian::write_u16(&mut self.bytes[at..at + 2], value);
        self
    }

    /// Apply the same setter to all four channels
    pub fn each_channel(self, f: impl Fn(Self, usize) -> Self) -> Self {
        (0..CHANNEL_COUNT).fold(self, f)
    }

    /// Raw bytes of the frame
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        self.bytes
    }

    /// Build the frame
    pub fn build(self) -> Frame {
        Frame(self.bytes)
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
