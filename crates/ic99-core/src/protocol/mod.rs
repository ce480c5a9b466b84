//! Serial Protocol
//!
//! Implements the IC99 charger's fixed-size status frame.
//!
//! The charger pushes one 74-byte frame at a time over a 9600-8N1 link with no
//! length prefix or checksum, so the reader has to find frame boundaries by
//! itself from the header and terminator bytes.

mod error;
pub mod frame;
pub mod resync;
pub mod serial;
pub mod tables;

pub use error::ChargerError;
pub use frame::{Frame, FrameBuilder};
pub use resync::FrameReader;
pub use serial::{configure_port, list_ports, open_port, PortInfo};

/// Default baud rate of the charger link
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout for a single serial read in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Length of one status frame, header and terminator included
pub const FRAME_LEN: usize = 74;

/// First two bytes of every frame
pub const FRAME_HEADER: [u8; 2] = [0xFF, 0xFE];

/// Last byte of every frame
pub const FRAME_TERMINATOR: u8 = 0xAA;
