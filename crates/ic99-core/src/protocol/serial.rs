//! Serial port handling
//!
//! Port discovery and opening for the charger link.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use super::{ChargerError, DEFAULT_BAUD_RATE};

/// A serial device the charger might be attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor and product ID of the adapter, if it is a USB device
    pub usb_id: Option<(u16, u16)>,

    /// Product string reported by the adapter
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            usb_id: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                usb_id: Some((usb.vid, usb.pid)),
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Sort key putting CDC-ACM devices first, then USB-serial bridges, then
/// everything else, numeric suffixes in order.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in [(0u8, "ttyACM"), (1, "ttyUSB")] {
        if let Some(rest) = basename.strip_prefix(prefix) {
            let num = rest.parse::<usize>().unwrap_or(usize::MAX);
            return (rank, num, basename.to_string());
        }
    }
    (2, 0, basename.to_string())
}

/// List candidate serial ports in a stable order
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| {
            let p = PortInfo::from(info);
            (p.name.clone(), p)
        })
        .collect();

    // udev may not have enumerated the adapter yet
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            let Some(fname) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                let full = format!("/dev/{}", fname);
                map.entry(full.clone()).or_insert_with(|| PortInfo::bare(full));
            }
        }
    }

    let mut ports: Vec<PortInfo> = map.into_values().collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports
}

/// Open the charger's serial port.
///
/// The charger only talks 8N1; `baud_rate` defaults to 9600.
pub fn open_port(
    name: &str,
    baud_rate: Option<u32>,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, ChargerError> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);

    let mut port = serialport::new(name, baud)
        .timeout(timeout)
        .open()
        .map_err(|e| ChargerError::SerialError(format!("{}: {}", name, e)))?;
    configure_port(port.as_mut())?;

    tracing::debug!("opened {} at {} baud (8N1)", name, baud);
    Ok(port)
}

/// Configure a serial port for the charger link
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ChargerError> {
    // Standard 8N1 configuration
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ChargerError::SerialError(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ChargerError::SerialError(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ChargerError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ChargerError::SerialError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // Host dependent; only checks the ordering holds on whatever is present
        let ports = list_ports();
        let keys: Vec<_> = ports.iter().map(|p| port_sort_key(&p.name)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_open_missing_port() {
        let result = open_port("/dev/ic99-does-not-exist", None, Duration::from_millis(10));
        assert!(matches!(result, Err(ChargerError::SerialError(_))));
    }

    #[test]
    fn test_port_sorting() {
        let names = [
            "/dev/ttyACM1",
            "/dev/ttyUSB10",
            "/dev/ttyS0",
            "/dev/ttyUSB0",
            "/dev/ttyACM0",
            "/dev/ttyUSB2",
        ];
        let mut ports: Vec<PortInfo> = names
            .iter()
            .map(|n| PortInfo::bare(n.to_string()))
            .collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyUSB0",
                "/dev/ttyUSB2",
                "/dev/ttyUSB10",
                "/dev/ttyS0",
            ]
        );
    }
}
