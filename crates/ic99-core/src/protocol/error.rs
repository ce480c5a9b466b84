//! Protocol errors

use thiserror::Error;

/// Errors that can occur while reading and decoding charger telemetry
#[derive(Error, Debug)]
pub enum ChargerError {
    /// Header or terminator bytes do not match
    #[error("Invalid frame: header {header:02X?}, terminator {terminator:#04x}")]
    FrameFormat {
        /// First two bytes of the rejected window
        header: [u8; 2],
        /// Last byte of the rejected window
        terminator: u8,
    },

    /// Raw bytes were not exactly one frame long
    #[error("Invalid frame length: expected 74 bytes, got {0}")]
    InvalidLength(usize),

    /// The byte source failed or closed
    #[error("Device read error: {0}")]
    DeviceRead(#[from] std::io::Error),

    /// The serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Unusable configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChargerError {
    /// Whether this error came from a malformed frame rather than the link
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            ChargerError::FrameFormat { .. } | ChargerError::InvalidLength(_)
        )
    }
}
