//! # IC99 Core Library
//!
//! Telemetry reader for the IC99 four-channel battery charger.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Resynchronization on the charger's fixed 74-byte status frame
//! - Decoding of per-channel mode, status and measurements
//! - Non-blocking fan-out of decoded samples to any number of subscribers
//! - A device loop tying the serial link to the above
//!
//! ## Example
//!
//! ```rust,ignore
//! use ic99_core::device::{Charger, ChargerConfig};
//!
//! let charger = Charger::new(ChargerConfig::default());
//! let (mut samples, unsubscribe) = charger.subscribe();
//! let reader = charger.start()?;
//!
//! while let Some(sample) = samples.recv().await {
//!     println!("{}", sample.to_json()?);
//! }
//! unsubscribe.unsubscribe();
//! ```

pub mod broadcast;
pub mod charger;
pub mod device;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::broadcast::{Broadcaster, SampleReceiver, Unsubscribe, SUBSCRIBER_CAPACITY};
    pub use crate::charger::{ChargerChannel, ChargerData, ChargerMode, ChargerStatus};
    pub use crate::device::{Charger, ChargerConfig};
    pub use crate::protocol::{ChargerError, Frame, FrameBuilder, FrameReader};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
