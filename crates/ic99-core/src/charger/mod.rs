//! Charger Telemetry
//!
//! Typed per-channel state decoded from one status frame, and the JSON shape
//! handed to remote clients.

mod decode;

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::protocol::tables::CHANNEL_COUNT;
use crate::protocol::ChargerError;

/// Divisor turning a raw capacity counter into capacity units
pub const CAPACITY_SCALE: f64 = 4096.0;

/// Operating function selected on a channel. Encoded one-hot on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargerMode {
    /// Charge the cell
    Charge,
    /// Discharge the cell
    Discharge,
    /// Repeated discharge/charge cycles
    Refresh,
    /// Discharge then charge, measuring capacity
    ChargeTest,
    /// Measure internal resistance
    ImpedanceTest,
    /// A mode byte that is not one of the known one-hot values
    Unknown(u8),
}

impl ChargerMode {
    /// All known modes, in bit order
    pub const ALL: [ChargerMode; 5] = [
        ChargerMode::Charge,
        ChargerMode::Discharge,
        ChargerMode::Refresh,
        ChargerMode::ChargeTest,
        ChargerMode::ImpedanceTest,
    ];

    /// Interpret a raw mode byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => ChargerMode::Charge,
            0x02 => ChargerMode::Discharge,
            0x04 => ChargerMode::Refresh,
            0x08 => ChargerMode::ChargeTest,
            0x10 => ChargerMode::ImpedanceTest,
            other => ChargerMode::Unknown(other),
        }
    }

    /// Wire value of this mode
    pub fn bits(self) -> u8 {
        match self {
            ChargerMode::Charge => 0x01,
            ChargerMode::Discharge => 0x02,
            ChargerMode::Refresh => 0x04,
            ChargerMode::ChargeTest => 0x08,
            ChargerMode::ImpedanceTest => 0x10,
            ChargerMode::Unknown(b) => b,
        }
    }

    /// Name used in serialized samples
    pub fn name(self) -> &'static str {
        match self {
            ChargerMode::Charge => "CHARGE",
            ChargerMode::Discharge => "DISCHARGE",
            ChargerMode::Refresh => "REFRESH",
            ChargerMode::ChargeTest => "CHARGE_TEST",
            ChargerMode::ImpedanceTest => "IMPEDANCE_TEST",
            ChargerMode::Unknown(_) => "UNKNOWN",
        }
    }
}

impl Default for ChargerMode {
    fn default() -> Self {
        ChargerMode::Unknown(0)
    }
}

impl fmt::Display for ChargerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ChargerMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Observed condition of a channel, derived from several status bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargerStatus {
    /// Charging
    Charge,
    /// Discharging
    Discharge,
    /// Program finished
    Complete,
    /// No cell in the slot
    Empty,
    /// Paused between refresh cycles
    Repause,
    /// Charger-wide over-temperature protection
    #[serde(rename = "TEMPROTECT")]
    TempProtect,
    /// No status bit set
    #[default]
    Unknown,
}

impl ChargerStatus {
    /// Name used in serialized samples
    pub fn name(self) -> &'static str {
        match self {
            ChargerStatus::Charge => "CHARGE",
            ChargerStatus::Discharge => "DISCHARGE",
            ChargerStatus::Complete => "COMPLETE",
            ChargerStatus::Empty => "EMPTY",
            ChargerStatus::Repause => "REPAUSE",
            ChargerStatus::TempProtect => "TEMPROTECT",
            ChargerStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ChargerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded state of one charger channel.
///
/// Measurement fields stay zero when the slot is empty; only the capacity
/// field matching the status is filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChargerChannel {
    /// Logical channel index, 0..4
    pub index: usize,
    /// Selected operating mode
    pub mode: ChargerMode,
    /// Observed condition
    pub status: ChargerStatus,
    /// Current set on the panel
    pub configured_current: u16,
    /// Present current
    pub current: u16,
    /// Cell voltage with no load applied
    pub offline_voltage: u16,
    /// Cell voltage under load
    pub online_voltage: u16,
    /// Raw capacity counter while charging
    pub charge_capacity: u32,
    /// Raw capacity counter for every other non-empty status
    pub discharge_capacity: u32,
    /// Elapsed minutes
    pub time: u16,
    /// Internal resistance
    pub impedance: u16,
}

impl ChargerChannel {
    /// Charged capacity in capacity units
    pub fn charge_capacity(&self) -> f64 {
        self.charge_capacity as f64 / CAPACITY_SCALE
    }

    /// Discharged capacity in capacity units
    pub fn discharge_capacity(&self) -> f64 {
        self.discharge_capacity as f64 / CAPACITY_SCALE
    }

    /// Elapsed time of the running program
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.time) * 60)
    }
}

/// Wire shape of a channel in serialized samples
#[derive(Serialize)]
struct ChannelSample<'a> {
    index: usize,
    mode: &'a ChargerMode,
    status: &'a ChargerStatus,
    configured_current: u16,
    now_current: u16,
    offline_voltage: u16,
    online_voltage: u16,
    charge_capacity: f64,
    discharge_capacity: f64,
    duration_min: u16,
}

impl Serialize for ChargerChannel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ChannelSample {
            index: self.index,
            mode: &self.mode,
            status: &self.status,
            configured_current: self.configured_current,
            now_current: self.current,
            offline_voltage: self.offline_voltage,
            online_voltage: self.online_voltage,
            charge_capacity: self.charge_capacity(),
            discharge_capacity: self.discharge_capacity(),
            duration_min: self.time,
        }
        .serialize(serializer)
    }
}

/// One decoded sample of all four channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargerData {
    /// Channels in logical order
    pub channels: [ChargerChannel; CHANNEL_COUNT],
    /// Identifier of the device that produced the sample
    pub id: String,
}

impl ChargerData {
    /// Channel by logical index
    pub fn channel(&self, index: usize) -> Option<&ChargerChannel> {
        self.channels.get(index)
    }

    /// Serialize to the JSON text sent to remote clients
    pub fn to_json(&self) -> Result<String, ChargerError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bytes() {
        for mode in ChargerMode::ALL {
            assert_eq!(ChargerMode::from_byte(mode.bits()), mode);
            assert_eq!(mode.bits().count_ones(), 1);
        }
        assert_eq!(ChargerMode::from_byte(0x03), ChargerMode::Unknown(0x03));
        assert_eq!(ChargerMode::from_byte(0x00).name(), "UNKNOWN");
    }

    #[test]
    fn test_status_serializes_by_name() {
        let json = serde_json::to_string(&ChargerStatus::TempProtect).unwrap();
        assert_eq!(json, "\"TEMPROTECT\"");
        let json = serde_json::to_string(&ChargerStatus::Repause).unwrap();
        assert_eq!(json, "\"REPAUSE\"");
    }

    #[test]
    fn test_status_json_matches_name() {
        for status in [
            ChargerStatus::Charge,
            ChargerStatus::Discharge,
            ChargerStatus::Complete,
            ChargerStatus::Empty,
            ChargerStatus::Repause,
            ChargerStatus::TempProtect,
            ChargerStatus::Unknown,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.name()));
        }
    }

    #[test]
    fn test_derived_accessors() {
        let ch = ChargerChannel {
            charge_capacity: 6144,
            discharge_capacity: 1024,
            time: 90,
            ..Default::default()
        };
        assert_eq!(ch.charge_capacity(), 1.5);
        assert_eq!(ch.discharge_capacity(), 0.25);
        assert_eq!(ch.duration(), Duration::from_secs(90 * 60));
    }

    #[test]
    fn test_channel_sample_schema() {
        let ch = ChargerChannel {
            index: 2,
            mode: ChargerMode::ChargeTest,
            status: ChargerStatus::Charge,
            configured_current: 500,
            current: 480,
            offline_voltage: 1300,
            online_voltage: 1450,
            charge_capacity: 8192,
            discharge_capacity: 0,
            time: 12,
            impedance: 40,
        };
        let value = serde_json::to_value(&ch).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "index": 2,
                "mode": "CHARGE_TEST",
                "status": "CHARGE",
                "configured_current": 500,
                "now_current": 480,
                "offline_voltage": 1300,
                "online_voltage": 1450,
                "charge_capacity": 2.0,
                "discharge_capacity": 0.0,
                "duration_min": 12
            })
        );
    }
}
