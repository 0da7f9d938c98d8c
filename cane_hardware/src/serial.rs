//! Physical serial transport backed by `serial2`.

use std::io::ErrorKind;
use std::time::Duration;

use cane_traits::{Connector, Transport};
use serial2::SerialPort;
use tracing::{debug, trace};

use crate::error::{HwError, Result};

pub struct SerialTransport {
    port: SerialPort,
    name: String,
}

impl SerialTransport {
    pub fn open(name: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let mut port = SerialPort::open(name, baud_rate).map_err(|source| HwError::Open {
            port: name.to_string(),
            source,
        })?;
        port.set_read_timeout(read_timeout)?;
        debug!(port = name, baud_rate, ?read_timeout, "serial port opened");
        Ok(Self {
            port,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Transport for SerialTransport {
    fn read_byte(&self) -> std::result::Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => {
                trace!(byte = buf[0], "serial rx");
                Ok(Some(buf[0]))
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Err(Box::new(HwError::Timeout))
            }
            Err(e) => Err(Box::new(HwError::Io(e))),
        }
    }

    fn write_all(&self, bytes: &[u8]) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.port
            .write_all(bytes)
            .map_err(|e| Box::new(HwError::Io(e)) as Box<dyn std::error::Error + Send + Sync>)
    }
}

/// Opens `SerialTransport`s; the production connector.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn connect(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> std::result::Result<Box<dyn Transport>, Box<dyn std::error::Error + Send + Sync>> {
        let t = SerialTransport::open(port, baud_rate, read_timeout)?;
        Ok(Box::new(t))
    }

    fn available_ports(&self) -> Vec<String> {
        match SerialPort::available_ports() {
            Ok(ports) => ports
                .into_iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to enumerate serial ports");
                Vec::new()
            }
        }
    }
}
