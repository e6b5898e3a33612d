//! Serial Transports
//!
//! [`PortOpener`] turns connection parameters into a byte stream. The native
//! opener drives a real device through `tokio-serial`; the mock opener hands
//! out in-memory pipes so the pipeline can be exercised without hardware.

use crate::config::{ConnectionConfig, DataBits, Parity, StopBits};
use crate::error::SerialError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt};
use tracing::{debug, info};

/// Buffer size of each mock pipe direction
const MOCK_PIPE_CAPACITY: usize = 64 * 1024;

/// Any bidirectional byte stream the adapter can drive
pub trait SerialTransport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + ?Sized> SerialTransport for T {}

/// Opens the physical connection
pub trait PortOpener: Send + Sync {
    /// Open a transport with the given parameters, with stale input discarded
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn SerialTransport>, SerialError>;
}

/// Opener backed by the operating system's serial driver
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePortOpener;

impl PortOpener for NativePortOpener {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn SerialTransport>, SerialError> {
        info!(
            "Opening serial port {} at {} baud",
            config.port_name, config.baud_rate
        );

        let builder = tokio_serial::new(config.port_name.as_str(), config.baud_rate.get())
            .data_bits(native_data_bits(config.data_bits))
            .parity(native_parity(config.parity)?)
            .stop_bits(native_stop_bits(config.stop_bits)?);

        let port = builder.open_native_async().map_err(|e| SerialError::Open {
            port: config.port_name.clone(),
            reason: e.to_string(),
        })?;

        port.clear(ClearBuffer::Input).map_err(|e| SerialError::Open {
            port: config.port_name.clone(),
            reason: format!("failed to discard stale input: {}", e),
        })?;

        Ok(Box::new(port))
    }
}

fn native_data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Five => tokio_serial::DataBits::Five,
        DataBits::Six => tokio_serial::DataBits::Six,
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn native_parity(parity: Parity) -> Result<tokio_serial::Parity, SerialError> {
    match parity {
        Parity::None => Ok(tokio_serial::Parity::None),
        Parity::Odd => Ok(tokio_serial::Parity::Odd),
        Parity::Even => Ok(tokio_serial::Parity::Even),
        Parity::Mark | Parity::Space => Err(SerialError::UnsupportedSetting(format!(
            "{:?} parity",
            parity
        ))),
    }
}

fn native_stop_bits(stop_bits: StopBits) -> Result<tokio_serial::StopBits, SerialError> {
    match stop_bits {
        StopBits::One => Ok(tokio_serial::StopBits::One),
        StopBits::Two => Ok(tokio_serial::StopBits::Two),
        StopBits::OnePointFive => Err(SerialError::UnsupportedSetting(
            "1.5 stop bits".to_string(),
        )),
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: VecDeque<MockDevice>,
    opened: Vec<ConnectionConfig>,
    fail_next: Option<String>,
}

/// Opener for tests and demos; every open creates a fresh in-memory pipe
#[derive(Debug, Default, Clone)]
pub struct MockPortOpener {
    state: Arc<Mutex<MockState>>,
}

impl MockPortOpener {
    /// Create a mock opener
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next open fail with the given reason
    pub fn fail_next_open(&self, reason: &str) {
        self.lock().fail_next = Some(reason.to_string());
    }

    /// Take the device end of the oldest pipe not yet claimed
    pub fn take_device(&self) -> Option<MockDevice> {
        self.lock().devices.pop_front()
    }

    /// Parameters of every successful open, oldest first
    pub fn opened_with(&self) -> Vec<ConnectionConfig> {
        self.lock().opened.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PortOpener for MockPortOpener {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn SerialTransport>, SerialError> {
        let mut state = self.lock();
        if let Some(reason) = state.fail_next.take() {
            return Err(SerialError::Open {
                port: config.port_name.clone(),
                reason,
            });
        }

        debug!("Mock mode: opening in-memory port {}", config.port_name);
        let (host, device) = tokio::io::duplex(MOCK_PIPE_CAPACITY);
        state.devices.push_back(MockDevice { stream: device });
        state.opened.push(config.clone());

        Ok(Box::new(host))
    }
}

/// The far end of a mock port, standing in for the attached device
#[derive(Debug)]
pub struct MockDevice {
    stream: DuplexStream,
}

impl MockDevice {
    /// Push bytes toward the host as one chunk
    pub async fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Read exactly `len` bytes the host wrote
    pub async fn receive(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Unplug the device; the host sees end-of-stream
    pub fn hang_up(self) {
        drop(self.stream);
    }
}
