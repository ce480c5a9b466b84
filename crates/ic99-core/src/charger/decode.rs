//! Frame decoder

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{ChargerChannel, ChargerData, ChargerMode, ChargerStatus};
use crate::protocol::frame::{offsets, TEMP_PROTECT_FLAG};
use crate::protocol::tables::{mode_offset, status_shift, value_slot};
use crate::protocol::{ChargerError, Frame, FRAME_LEN};

type Raw = [u8; FRAME_LEN];

fn is_charging(b: &Raw, ch: usize) -> bool {
    (b[offsets::STATUS_ACTIVE] >> status_shift(ch)) & 0x01 != 0
}

fn is_discharging(b: &Raw, ch: usize) -> bool {
    (b[offsets::STATUS_ACTIVE] >> status_shift(ch)) & 0x02 != 0
}

fn is_empty(b: &Raw, ch: usize) -> bool {
    (b[offsets::STATUS_EMPTY_COMPLETE] >> ch) & 0x01 != 0
}

fn is_complete(b: &Raw, ch: usize) -> bool {
    (b[offsets::STATUS_EMPTY_COMPLETE] >> (ch + 4)) & 0x01 != 0
}

// Charger-wide, not per channel
fn is_temp_protected(b: &Raw, _ch: usize) -> bool {
    b[offsets::STATUS_FLAGS] & TEMP_PROTECT_FLAG != 0
}

fn is_repaused(b: &Raw, ch: usize) -> bool {
    (b[offsets::STATUS_FLAGS] >> (status_shift(ch) / 2)) & 0x01 != 0
}

/// Status rules in priority order; the first one that matches wins
const STATUS_RULES: [(ChargerStatus, fn(&Raw, usize) -> bool); 6] = [
    (ChargerStatus::Charge, is_charging),
    (ChargerStatus::Discharge, is_discharging),
    (ChargerStatus::Empty, is_empty),
    (ChargerStatus::Complete, is_complete),
    (ChargerStatus::TempProtect, is_temp_protected),
    (ChargerStatus::Repause, is_repaused),
];

fn decode_status(raw: &Raw, channel: usize) -> ChargerStatus {
    STATUS_RULES
        .iter()
        .find(|(_, rule)| rule(raw, channel))
        .map(|(status, _)| *status)
        .unwrap_or(ChargerStatus::Unknown)
}

fn u16_le(raw: &Raw, base: usize, slot: usize) -> u16 {
    let at = base + 2 * slot;
    LittleEndian::read_u16(&raw[at..at + 2])
}

impl ChargerChannel {
    /// Decode one logical channel out of a frame. `index` must be below 4.
    pub(crate) fn decode(index: usize, frame: &Frame) -> Self {
        let raw = frame.as_bytes();
        let slot = value_slot(index);

        let mut ch = ChargerChannel {
            index,
            mode: ChargerMode::from_byte(raw[mode_offset(index)]),
            status: decode_status(raw, index),
            configured_current: u16_le(raw, offsets::CONFIGURED_CURRENT, slot),
            ..Default::default()
        };

        if ch.status == ChargerStatus::Empty {
            return ch;
        }

        ch.current = u16_le(raw, offsets::CURRENT, slot);
        ch.offline_voltage = u16_le(raw, offsets::OFFLINE_VOLTAGE, slot);
        ch.online_voltage = u16_le(raw, offsets::ONLINE_VOLTAGE, slot);

        let at = offsets::CAPACITY + 4 * slot;
        let capacity = LittleEndian::read_u32(&raw[at..at + 4]);
        if ch.status == ChargerStatus::Charge {
            ch.charge_capacity = capacity;
        } else {
            ch.discharge_capacity = capacity;
        }

        // The only big-endian field in the frame
        let at = offsets::TIME + 2 * slot;
        ch.time = BigEndian::read_u16(&raw[at..at + 2]);
        ch.impedance = u16_le(raw, offsets::IMPEDANCE, slot);

        ch
    }
}

impl ChargerData {
    /// Decode raw bytes from any source, checking header and terminator first
    pub fn decode(id: impl Into<String>, data: &[u8]) -> Result<Self, ChargerError> {
        let frame = Frame::from_bytes(data)?;
        Ok(Self::from_frame(id, &frame))
    }

    /// Decode a validated frame
    pub fn from_frame(id: impl Into<String>, frame: &Frame) -> Self {
        Self {
            channels: std::array::from_fn(|index| ChargerChannel::decode(index, frame)),
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuilder;
    use pretty_assertions::assert_eq;

    fn status_of(builder: FrameBuilder, channel: usize) -> ChargerStatus {
        ChargerChannel::decode(channel, &builder.build()).status
    }

    #[test]
    fn test_status_each_rule() {
        for ch in 0..4 {
            let b = FrameBuilder::new;
            assert_eq!(status_of(b().charging(ch), ch), ChargerStatus::Charge);
            assert_eq!(status_of(b().discharging(ch), ch), ChargerStatus::Discharge);
            assert_eq!(status_of(b().empty(ch), ch), ChargerStatus::Empty);
            assert_eq!(status_of(b().complete(ch), ch), ChargerStatus::Complete);
            assert_eq!(status_of(b().temp_protect(), ch), ChargerStatus::TempProtect);
            assert_eq!(status_of(b().repause(ch), ch), ChargerStatus::Repause);
            assert_eq!(status_of(b(), ch), ChargerStatus::Unknown);
        }
    }

    #[test]
    fn test_status_priority() {
        let b = FrameBuilder::new()
            .charging(0)
            .discharging(0)
            .empty(0)
            .complete(0)
            .temp_protect()
            .repause(0);
        assert_eq!(status_of(b.clone(), 0), ChargerStatus::Charge);

        let b = FrameBuilder::new().empty(1).complete(1).temp_protect();
        assert_eq!(status_of(b, 1), ChargerStatus::Empty);

        let b = FrameBuilder::new().complete(2).temp_protect().repause(2);
        assert_eq!(status_of(b, 2), ChargerStatus::Complete);

        let b = FrameBuilder::new().temp_protect().repause(3);
        assert_eq!(status_of(b, 3), ChargerStatus::TempProtect);
    }

    #[test]
    fn test_status_bits_do_not_leak_across_channels() {
        let frame = FrameBuilder::new().charging(1).build();
        let data = ChargerData::from_frame("x", &frame);
        let statuses: Vec<_> = data.channels.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![
                ChargerStatus::Unknown,
                ChargerStatus::Charge,
                ChargerStatus::Unknown,
                ChargerStatus::Unknown,
            ]
        );
    }

    #[test]
    fn test_empty_channel_zeroes_measurements() {
        let frame = FrameBuilder::new()
            .each_channel(|b, ch| {
                b.configured_current(ch, 700)
                    .current(ch, 650)
                    .offline_voltage(ch, 1200)
                    .online_voltage(ch, 1400)
                    .capacity(ch, 40960)
                    .minutes(ch, 33)
                    .impedance(ch, 21)
            })
            .empty(2)
            .build();

        let ch = ChargerChannel::decode(2, &frame);
        assert_eq!(
            ch,
            ChargerChannel {
                index: 2,
                mode: ChargerMode::Unknown(0),
                status: ChargerStatus::Empty,
                configured_current: 700,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_capacity_follows_status() {
        let frame = FrameBuilder::new()
            .each_channel(|b, ch| b.capacity(ch, 4096 * (ch as u32 + 1)))
            .charging(0)
            .discharging(1)
            .complete(2)
            .build();
        let data = ChargerData::from_frame("x", &frame);

        assert_eq!(data.channels[0].charge_capacity, 4096);
        assert_eq!(data.channels[0].discharge_capacity, 0);
        assert_eq!(data.channels[1].charge_capacity, 0);
        assert_eq!(data.channels[1].discharge_capacity, 8192);
        // Anything but CHARGE reports through the discharge counter
        assert_eq!(data.channels[2].charge_capacity, 0);
        assert_eq!(data.channels[2].discharge_capacity, 12288);
    }

    #[test]
    fn test_time_is_big_endian() {
        let mut raw = FrameBuilder::new().charging(3).to_bytes();
        // Channel 3 occupies the first slot
        raw[57] = 0x01;
        raw[58] = 0x02;
        let data = ChargerData::decode("x", &raw).unwrap();
        assert_eq!(data.channels[3].time, 0x0102);
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        let mut raw = FrameBuilder::new().to_bytes();
        raw[0] = 0x00;
        assert!(matches!(
            ChargerData::decode("x", &raw),
            Err(ChargerError::FrameFormat { .. })
        ));

        let mut raw = FrameBuilder::new().to_bytes();
        raw[73] = 0xAB;
        assert!(matches!(
            ChargerData::decode("x", &raw),
            Err(ChargerError::FrameFormat { .. })
        ));
    }
}
