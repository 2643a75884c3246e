//! `serialport`-backed transport.
//!
//! The device is opened with a short read timeout; a blocking reader polls it
//! and forwards chunks as [`TransportEvent::Data`]. Close sets a stop flag the
//! reader observes on its next timeout.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use serialws_core::PortInfo;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::transport::{EventSender, OpenRequest, SerialLink, SerialTransport, TransportEvent};

/// Default poll interval of the reader.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

const READ_BUFFER_SIZE: usize = 1024;

/// Transport over the host's serial devices.
#[derive(Clone, Debug)]
pub struct HardwareTransport {
    read_timeout: Duration,
}

impl Default for HardwareTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareTransport {
    /// Transport with the default 10 ms read timeout.
    pub fn new() -> Self {
        Self::with_read_timeout(DEFAULT_READ_TIMEOUT)
    }

    /// Transport polling the device every `read_timeout`.
    pub fn with_read_timeout(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    /// Configured read timeout.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

#[async_trait]
impl SerialTransport for HardwareTransport {
    async fn open(
        &self,
        request: &OpenRequest,
        events: EventSender,
    ) -> Result<Arc<dyn SerialLink>, TransportError> {
        let path = request.path.clone();
        let baud_rate = request.baud_rate;
        let timeout = self.read_timeout;

        let (writer, reader) = tokio::task::spawn_blocking(move || {
            let port = serialport::new(&path, baud_rate).timeout(timeout).open()?;
            let reader = port.try_clone()?;
            Ok::<_, TransportError>((port, reader))
        })
        .await??;

        let stop = Arc::new(AtomicBool::new(false));
        let _ = events.send(TransportEvent::Opened);

        let reader_stop = Arc::clone(&stop);
        let reader_path = request.path.clone();
        let _ = tokio::task::spawn_blocking(move || {
            read_loop(reader, &reader_stop, &events);
            debug!(path = %reader_path, "serial reader exited");
            let _ = events.send(TransportEvent::Closed);
        });

        info!(path = %request.path, baud_rate, "serial device opened");
        Ok(Arc::new(HardwareLink {
            writer: Arc::new(Mutex::new(Some(writer))),
            stop,
        }))
    }

    async fn list(&self) -> Result<Vec<PortInfo>, TransportError> {
        let ports = tokio::task::spawn_blocking(serialport::available_ports).await??;
        Ok(ports
            .into_iter()
            .filter(is_listed)
            .map(port_info_from)
            .collect())
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, stop: &AtomicBool, events: &EventSender) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    while !stop.load(Ordering::Acquire) {
        match port.read(&mut buf) {
            Ok(0) => {
                let _ = events.send(TransportEvent::Error("serial device disconnected".into()));
                break;
            }
            Ok(n) => {
                if events.send(TransportEvent::Data(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
            Err(e) => {
                warn!(error = %e, "serial read failed");
                let _ = events.send(TransportEvent::Error(e.to_string()));
                break;
            }
        }
    }
}

/// macOS exposes every device twice; only the `/dev/cu.*` call-out node is usable without carrier detect.
fn is_listed(_port: &SerialPortInfo) -> bool {
    #[cfg(target_os = "macos")]
    {
        !_port.port_name.starts_with("/dev/tty.")
    }
    #[cfg(not(target_os = "macos"))]
    {
        true
    }
}

fn port_info_from(port: SerialPortInfo) -> PortInfo {
    match port.port_type {
        SerialPortType::UsbPort(usb) => PortInfo::from_parts(
            port.port_name,
            usb.product,
            usb.manufacturer,
            usb.serial_number,
        ),
        SerialPortType::BluetoothPort => {
            PortInfo::from_parts(port.port_name, Some("Bluetooth".into()), None, None)
        }
        SerialPortType::PciPort | SerialPortType::Unknown => PortInfo::new(port.port_name),
    }
}

struct HardwareLink {
    writer: Arc<Mutex<Option<Box<dyn SerialPort>>>>,
    stop: Arc<AtomicBool>,
}

#[async_trait]
impl SerialLink for HardwareLink {
    async fn write(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let mut guard = writer.lock();
            let port = guard
                .as_mut()
                .ok_or_else(|| TransportError::Device("serial port is closed".into()))?;
            port.write_all(&bytes)?;
            port.flush()?;
            Ok(())
        })
        .await?
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.stop.store(true, Ordering::Release);
        let writer = Arc::clone(&self.writer);
        // Dropping the write handle releases the device once the reader exits too.
        tokio::task::spawn_blocking(move || drop(writer.lock().take())).await?;
        Ok(())
    }
}
