// Serial transport on the `serialport` crate.
//
// The port is blocking, so every operation hops onto the blocking pool.
// The port sits behind a std Mutex only so the blocking closures can own
// a handle; the session worker is the sole user.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, SerialPort, SerialPortType, StopBits};
use tracing::debug;

use super::{Connector, Transport};
use crate::error::TransportError;

/// Parity setting for serial port configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

/// Line settings for one serial endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Device path (`/dev/ttyS1`, `/dev/ttyACM0`, `COM3`).
    pub path: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
}

impl SerialSettings {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }

    fn data_bits(&self) -> DataBits {
        match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn stop_bits(&self) -> StopBits {
        match self.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }
}

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

fn poisoned() -> TransportError {
    TransportError::Io(std::io::Error::other("serial port mutex poisoned"))
}

fn join_failed(err: &tokio::task::JoinError) -> TransportError {
    TransportError::Io(std::io::Error::other(format!("serial worker failed: {err}")))
}

/// An open serial port.
pub struct SerialTransport {
    port: SharedPort,
    path: String,
}

impl SerialTransport {
    /// Open the port described by `settings`.
    pub async fn open(settings: &SerialSettings) -> Result<Self, TransportError> {
        if !Path::new(&settings.path).exists() && !settings.path.starts_with("COM") {
            return Err(TransportError::busy(format!("{} is not attached", settings.path)));
        }

        let builder = serialport::new(&settings.path, settings.baud_rate)
            .data_bits(settings.data_bits())
            .stop_bits(settings.stop_bits())
            .parity(settings.parity.into())
            .timeout(Duration::from_millis(100));

        let port = tokio::task::spawn_blocking(move || builder.open())
            .await
            .map_err(|e| join_failed(&e))??;

        debug!(path = %settings.path, baud = settings.baud_rate, "serial port opened");
        Ok(Self {
            port: Arc::new(Mutex::new(port)),
            path: settings.path.clone(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let port = Arc::clone(&self.port);
        let data = bytes.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut guard = port.lock().map_err(|_| poisoned())?;
            let n = guard.write(&data)?;
            guard.flush()?;
            Ok(n)
        })
        .await
        .map_err(|e| join_failed(&e))?
    }

    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let port = Arc::clone(&self.port);
        let len = buf.len();
        let chunk = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, TransportError> {
            let mut guard = port.lock().map_err(|_| poisoned())?;
            guard.set_timeout(timeout.max(Duration::from_millis(1)))?;
            let mut tmp = vec![0u8; len];
            match guard.read(&mut tmp) {
                Ok(n) => {
                    tmp.truncate(n);
                    Ok(tmp)
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| join_failed(&e))??;

        let n = chunk.len().min(len);
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), chunk.get(..n)) {
            dst.copy_from_slice(src);
        }
        Ok(n)
    }

    async fn flush_input(&mut self) -> Result<(), TransportError> {
        let port = Arc::clone(&self.port);
        tokio::task::spawn_blocking(move || {
            let guard = port.lock().map_err(|_| poisoned())?;
            guard.clear(ClearBuffer::Input)?;
            Ok(())
        })
        .await
        .map_err(|e| join_failed(&e))?
    }
}

/// Opens a [`SerialTransport`] on demand.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    settings: SerialSettings,
}

impl SerialConnector {
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

#[async_trait]
impl Connector for SerialConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let transport = SerialTransport::open(&self.settings).await?;
        Ok(Box::new(transport))
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.settings.path, self.settings.baud_rate)
    }
}

/// Information about an available serial port.
#[derive(Debug, Clone, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

/// Enumerate serial ports visible to the host.
pub fn available_ports() -> Result<Vec<SerialPortInfo>, TransportError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(info) => SerialPortInfo {
                port_name: p.port_name,
                port_type: "usb".into(),
                manufacturer: info.manufacturer,
                product: info.product,
                vid: Some(info.vid),
                pid: Some(info.pid),
            },
            other => SerialPortInfo {
                port_name: p.port_name,
                port_type: match other {
                    SerialPortType::PciPort => "pci",
                    SerialPortType::BluetoothPort => "bluetooth",
                    _ => "unknown",
                }
                .into(),
                manufacturer: None,
                product: None,
                vid: None,
                pid: None,
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_to_8n1() {
        let s = SerialSettings::new("/dev/ttyS1", 115_200);
        assert!(matches!(s.data_bits(), DataBits::Eight));
        assert!(matches!(s.stop_bits(), StopBits::One));
        assert_eq!(s.parity, Parity::None);
    }

    #[test]
    fn parity_converts() {
        assert!(matches!(serialport::Parity::from(Parity::Even), serialport::Parity::Even));
        assert!(matches!(serialport::Parity::from(Parity::Odd), serialport::Parity::Odd));
    }

    #[tokio::test]
    async fn missing_device_is_busy() {
        let settings = SerialSettings::new("/dev/relaylink-test-does-not-exist", 115_200);
        let result = SerialConnector::new(settings).connect().await;
        assert!(matches!(result, Err(TransportError::Busy { .. })));
    }
}
