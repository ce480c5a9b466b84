//! Device loop
//!
//! Owns one charger link and drives read -> decode -> broadcast until the
//! link fails. There is no reconnect: the first read or decode error ends
//! the loop, and subscribers simply stop receiving samples.

use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::broadcast::{Broadcaster, SampleReceiver, Unsubscribe};
use crate::charger::ChargerData;
use crate::protocol::{
    open_port, ChargerError, FrameReader, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS,
};

/// Charger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerConfig {
    /// Serial port name
    pub port_name: String,
    /// Identifier stamped on every sample from this device
    pub id: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Upper bound for one blocking serial read; an idle line is retried
    pub read_timeout_ms: u64,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB0".to_string(),
            id: "1".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ChargerConfig {
    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChargerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ChargerError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check for values the link cannot work with
    pub fn validate(&self) -> Result<(), ChargerError> {
        if self.port_name.is_empty() {
            return Err(ChargerError::ConfigError("port_name is empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(ChargerError::ConfigError("baud_rate must be positive".into()));
        }
        if self.read_timeout_ms == 0 {
            return Err(ChargerError::ConfigError(
                "read_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// One charger device and the subscribers listening to it
pub struct Charger {
    config: ChargerConfig,
    broadcaster: Arc<Broadcaster>,
}

impl Charger {
    /// Create a charger with its own broadcaster
    pub fn new(config: ChargerConfig) -> Self {
        Self::with_broadcaster(config, Arc::new(Broadcaster::new()))
    }

    /// Create a charger publishing through an existing broadcaster
    pub fn with_broadcaster(config: ChargerConfig, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            config,
            broadcaster,
        }
    }

    /// Device identifier
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Configuration in use
    pub fn config(&self) -> &ChargerConfig {
        &self.config
    }

    /// Broadcaster samples are published on
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Subscribe to decoded samples from this device
    pub fn subscribe(&self) -> (SampleReceiver, Unsubscribe) {
        self.broadcaster.subscribe()
    }

    /// Open the serial port and start the device loop on its own thread
    pub fn start(&self) -> Result<JoinHandle<ChargerError>, ChargerError> {
        self.config.validate()?;
        let port = open_port(
            &self.config.port_name,
            Some(self.config.baud_rate),
            self.config.read_timeout(),
        )?;
        self.spawn(port)
    }

    /// Start the device loop over any byte source on a dedicated thread.
    ///
    /// The handle yields the error that ended the loop.
    pub fn spawn<R>(&self, source: R) -> Result<JoinHandle<ChargerError>, ChargerError>
    where
        R: Read + Send + 'static,
    {
        let id = self.config.id.clone();
        let label = self.config.port_name.clone();
        let broadcaster = Arc::clone(&self.broadcaster);

        thread::Builder::new()
            .name(format!("ic99-{}", id))
            .spawn(move || {
                tracing::info!("start reading {}", label);
                run_loop(source, &id, &broadcaster)
            })
            .map_err(|e| ChargerError::SerialError(format!("failed to spawn reader: {}", e)))
    }
}

/// Read, decode and broadcast frames until the source fails.
///
/// Blocks the calling thread; returns the error that ended the loop.
pub fn run_loop<R: Read>(source: R, id: &str, broadcaster: &Broadcaster) -> ChargerError {
    let mut frames = FrameReader::new(source);
    let err = loop {
        let frame = match frames.next() {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => break e,
            None => break ChargerError::DeviceRead(io::ErrorKind::UnexpectedEof.into()),
        };
        tracing::debug!("read {}", frame.hex());

        match ChargerData::decode(id, frame.as_bytes()) {
            Ok(sample) => broadcaster.broadcast(sample),
            Err(e) => break e,
        }
    };

    tracing::error!("charger {} stopped: {}", id, err);
    err
}
