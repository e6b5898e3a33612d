//! Serial Port Adapter
//!
//! Owns the single physical connection. Opening starts a cancellable reader
//! task that drains the port, frames the bytes with the current read mode and
//! pushes each message onto the [`MessageSender`].
//!
//! The transport lives in a slot shared by the reader and writers rather than
//! inside the reader task, so closing releases the device before `close`
//! returns instead of whenever the runtime next polls the reader.

use crate::channel::{MessageSender, SessionId};
use crate::config::{ConnectionConfig, RuntimeConfig};
use crate::decoder::FrameDecoder;
use crate::error::SerialError;
use crate::transport::{PortOpener, SerialTransport};
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{ready, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest chunk pulled from the port in one read
const READ_CHUNK_SIZE: usize = 4096;

/// Slot holding the open transport; emptied on close
#[derive(Clone)]
struct PortSlot {
    transport: Arc<Mutex<Option<Box<dyn SerialTransport>>>>,
}

impl PortSlot {
    fn new(transport: Box<dyn SerialTransport>) -> Self {
        Self {
            transport: Arc::new(Mutex::new(Some(transport))),
        }
    }

    /// Drop the transport, releasing the device
    fn release(&self) -> bool {
        self.lock().take().is_some()
    }

    /// Run one poll against the transport; the lock is held only for the poll
    fn poll_with<T>(
        &self,
        poll: impl FnOnce(Pin<&mut Box<dyn SerialTransport>>) -> Poll<io::Result<T>>,
    ) -> Poll<io::Result<T>> {
        match self.lock().as_mut() {
            Some(transport) => poll(Pin::new(transport)),
            None => Poll::Ready(Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"))),
        }
    }

    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        poll_fn(|cx| {
            let mut read_buf = ReadBuf::new(&mut *buf);
            ready!(self.poll_with(|t| t.poll_read(cx, &mut read_buf)))?;
            Poll::Ready(Ok(read_buf.filled().len()))
        })
        .await
    }

    async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < data.len() {
            let n = poll_fn(|cx| self.poll_with(|t| t.poll_write(cx, &data[written..]))).await?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            written += n;
        }
        poll_fn(|cx| self.poll_with(|t| t.poll_flush(cx))).await
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn SerialTransport>>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One open connection
struct Session {
    id: SessionId,
    port_name: String,
    port: PortSlot,
    /// Serialises writers so concurrent writes never interleave
    write_gate: Arc<tokio::sync::Mutex<()>>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

impl Session {
    fn is_alive(&self) -> bool {
        !self.reader.is_finished()
    }

    fn shut(self) {
        self.cancel.cancel();
        self.port.release();
    }
}

/// Adapter between the serial transport and the message channel
pub struct SerialPortAdapter {
    opener: Arc<dyn PortOpener>,
    connection: watch::Receiver<ConnectionConfig>,
    runtime: watch::Receiver<RuntimeConfig>,
    sender: MessageSender,
    next_session: AtomicU64,
    session: Mutex<Option<Session>>,
}

impl SerialPortAdapter {
    /// Create a disconnected adapter
    ///
    /// # Arguments
    /// * `opener` - Produces the transport on each open
    /// * `connection` - Connection parameters, read at open time
    /// * `runtime` - Framing parameters, re-read before every chunk
    /// * `sender` - Destination for framed messages
    pub fn new(
        opener: Arc<dyn PortOpener>,
        connection: watch::Receiver<ConnectionConfig>,
        runtime: watch::Receiver<RuntimeConfig>,
        sender: MessageSender,
    ) -> Self {
        Self {
            opener,
            connection,
            runtime,
            sender,
            next_session: AtomicU64::new(1),
            session: Mutex::new(None),
        }
    }

    /// Whether a session is open and its reader is still running
    pub fn is_connected(&self) -> bool {
        self.lock().as_ref().is_some_and(Session::is_alive)
    }

    /// Open the port with the current connection parameters and start reading.
    ///
    /// Returns the id every event of the new session is tagged with. Must be
    /// called from within a Tokio runtime.
    pub fn open(&self) -> Result<SessionId, SerialError> {
        let mut session = self.lock();
        if session.as_ref().is_some_and(Session::is_alive) {
            return Err(SerialError::AlreadyConnected);
        }
        if let Some(dead) = session.take() {
            debug!("Discarding dead session on {}", dead.port_name);
            dead.shut();
        }

        let config = self.connection.borrow().clone();
        let handle = tokio::runtime::Handle::try_current().map_err(|e| SerialError::Open {
            port: config.port_name.clone(),
            reason: e.to_string(),
        })?;

        let transport = self.opener.open(&config).map_err(|e| {
            warn!("Failed to open {}: {}", config.port_name, e);
            e
        })?;
        let port = PortSlot::new(transport);

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let reader = handle.spawn(read_loop(
            port.clone(),
            self.runtime.clone(),
            self.sender.for_session(id),
            cancel.clone(),
            config.port_name.clone(),
        ));

        info!("Serial port {} connected (session {})", config.port_name, id);
        *session = Some(Session {
            id,
            port_name: config.port_name,
            port,
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
            cancel,
            reader,
        });
        Ok(id)
    }

    /// Stop the reader and release the port
    ///
    /// The transport is dropped before this returns.
    pub fn close(&self) -> Result<(), SerialError> {
        let session = self.lock().take().ok_or(SerialError::NotConnected)?;
        info!(
            "Serial port {} disconnected (session {})",
            session.port_name, session.id
        );
        session.shut();
        Ok(())
    }

    /// Id of the current session, live or not
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock().as_ref().map(|s| s.id)
    }

    /// Write bytes to the open port
    ///
    /// A close while the write is pending yields [`SerialError::Cancelled`].
    pub async fn write(&self, data: &[u8]) -> Result<(), SerialError> {
        let (port, gate, cancel) = {
            let session = self.lock();
            let session = session
                .as_ref()
                .filter(|s| s.is_alive())
                .ok_or(SerialError::NotConnected)?;
            (
                session.port.clone(),
                session.write_gate.clone(),
                session.cancel.clone(),
            )
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(SerialError::Cancelled),

            written = async {
                let _gate = gate.lock().await;
                port.write_all(data).await
            } => written.map_err(|e| {
                warn!("Serial write of {} bytes failed: {}", data.len(), e);
                SerialError::Write(e.to_string())
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SerialPortAdapter {
    fn drop(&mut self) {
        if let Some(session) = self.lock().take() {
            session.shut();
        }
    }
}

/// Drain the port until cancelled or the transport fails
async fn read_loop(
    port: PortSlot,
    mut runtime: watch::Receiver<RuntimeConfig>,
    sender: MessageSender,
    cancel: CancellationToken,
    port_name: String,
) {
    let mut decoder = FrameDecoder::new(runtime.borrow_and_update().framing());
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    let reason = loop {
        let read = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Read loop for {} cancelled", port_name);
                return;
            }

            read = port.read(&mut buf) => read,
        };

        let len = match read {
            Ok(0) => break "end of stream".to_string(),
            Ok(len) => len,
            Err(e) => break e.to_string(),
        };

        if runtime.has_changed().unwrap_or(false) {
            let framing = runtime.borrow_and_update().framing();
            decoder.set_mode(framing);
        }

        for message in decoder.feed(&buf[..len]) {
            if sender.emit(message, &cancel).await.is_err() {
                debug!("Read loop for {} cancelled while queueing", port_name);
                return;
            }
        }
    };

    warn!("Read loop for {} stopped: {}", port_name, reason);
    port.release();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = sender.connection_lost(reason) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{message_channel, MessageReceiver, PortEvent, SessionEvent};
    use crate::config::{ConfigHandle, ReadMode, ETX, STX};
    use crate::transport::MockPortOpener;
    use std::sync::atomic::AtomicBool;
    use std::task::Context;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::time::timeout;

    fn mock_adapter() -> (SerialPortAdapter, MockPortOpener, ConfigHandle, MessageReceiver) {
        let opener = MockPortOpener::new();
        let handle = ConfigHandle::default();
        let (tx, rx) = message_channel(16);
        let adapter = SerialPortAdapter::new(
            Arc::new(opener.clone()),
            handle.connection(),
            handle.runtime(),
            tx,
        );
        (adapter, opener, handle, rx)
    }

    async fn next_payload(rx: &mut MessageReceiver) -> Vec<u8> {
        match timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(SessionEvent {
                event: PortEvent::Message(m),
                ..
            })) => m.into_payload(),
            other => panic!("expected a message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_close_lifecycle() {
        let (adapter, _opener, _handle, _rx) = mock_adapter();
        assert!(!adapter.is_connected());
        assert_eq!(adapter.close(), Err(SerialError::NotConnected));

        adapter.open().unwrap();
        assert!(adapter.is_connected());
        assert_eq!(adapter.open(), Err(SerialError::AlreadyConnected));

        adapter.close().unwrap();
        assert!(!adapter.is_connected());
        assert_eq!(adapter.close(), Err(SerialError::NotConnected));
    }

    #[tokio::test]
    async fn test_open_failure_leaves_disconnected() {
        let (adapter, opener, _handle, _rx) = mock_adapter();
        opener.fail_next_open("device busy");
        assert!(matches!(adapter.open(), Err(SerialError::Open { .. })));
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn test_reads_newline_frames() {
        let (adapter, opener, _handle, mut rx) = mock_adapter();
        adapter.open().unwrap();
        let mut device = opener.take_device().unwrap();

        device.send(b"hel").await.unwrap();
        device.send(b"lo\r\nworld\n").await.unwrap();

        assert_eq!(next_payload(&mut rx).await, b"hello".to_vec());
        assert_eq!(next_payload(&mut rx).await, b"world".to_vec());
    }

    #[tokio::test]
    async fn test_runtime_mode_switch() {
        let (adapter, opener, handle, mut rx) = mock_adapter();
        adapter.open().unwrap();
        let mut device = opener.take_device().unwrap();

        device.send(b"line\n").await.unwrap();
        assert_eq!(next_payload(&mut rx).await, b"line".to_vec());

        handle.update_runtime(|r| {
            r.read_mode = ReadMode::StxEtx;
            r.packet_size = 3;
        });
        device.send(&[b'x', b'\n', STX, 0x7F, ETX]).await.unwrap();
        assert_eq!(next_payload(&mut rx).await, vec![STX, 0x7F, ETX]);
    }

    #[tokio::test]
    async fn test_write_reaches_device() {
        let (adapter, opener, _handle, _rx) = mock_adapter();
        assert_eq!(adapter.write(b"AT").await, Err(SerialError::NotConnected));

        adapter.open().unwrap();
        let mut device = opener.take_device().unwrap();
        adapter.write(b"AT\r\n").await.unwrap();
        assert_eq!(device.receive(4).await.unwrap(), b"AT\r\n".to_vec());
    }

    #[tokio::test]
    async fn test_connection_params_apply_on_next_open() {
        let (adapter, opener, handle, _rx) = mock_adapter();
        adapter.open().unwrap();

        handle.update_connection(|c| c.port_name = "/dev/ttyUSB1".to_string());
        assert_eq!(opener.opened_with()[0].port_name, "COM1");

        adapter.close().unwrap();
        adapter.open().unwrap();
        assert_eq!(opener.opened_with()[1].port_name, "/dev/ttyUSB1");
    }

    #[tokio::test]
    async fn test_hang_up_reports_connection_lost() {
        let (adapter, opener, _handle, mut rx) = mock_adapter();
        adapter.open().unwrap();
        opener.take_device().unwrap().hang_up();

        match timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(SessionEvent {
                session,
                event: PortEvent::ConnectionLost { reason },
            })) => {
                assert_eq!(session, 1);
                assert_eq!(reason, "end of stream");
            }
            other => panic!("expected connection lost, got {:?}", other),
        }

        tokio::task::yield_now().await;
        assert!(!adapter.is_connected());
        // A dead session does not block reconnecting
        adapter.open().unwrap();
        assert!(adapter.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_does_not_merge_frames() {
        let (adapter, opener, _handle, mut rx) = mock_adapter();
        adapter.open().unwrap();
        let mut first = opener.take_device().unwrap();
        first.send(b"partial").await.unwrap();
        tokio::task::yield_now().await;

        adapter.close().unwrap();
        adapter.open().unwrap();
        let mut second = opener.take_device().unwrap();
        second.send(b"fresh\n").await.unwrap();

        assert_eq!(next_payload(&mut rx).await, b"fresh".to_vec());
    }

    #[tokio::test]
    async fn test_sessions_get_distinct_ids() {
        let (adapter, opener, _handle, mut rx) = mock_adapter();
        assert_eq!(adapter.session_id(), None);

        let first = adapter.open().unwrap();
        adapter.close().unwrap();
        let second = adapter.open().unwrap();
        assert_ne!(first, second);
        assert_eq!(adapter.session_id(), Some(second));

        opener.take_device().unwrap();
        let mut device = opener.take_device().unwrap();
        device.send(b"tagged\n").await.unwrap();
        let event = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.session, second);
    }

    /// Transport that records when it is dropped
    struct TrackedTransport {
        inner: DuplexStream,
        dropped: Arc<AtomicBool>,
    }

    impl Drop for TrackedTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    impl AsyncRead for TrackedTransport {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for TrackedTransport {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    struct TrackedOpener {
        dropped: Arc<AtomicBool>,
        device: Mutex<Option<DuplexStream>>,
    }

    impl PortOpener for TrackedOpener {
        fn open(&self, _config: &ConnectionConfig) -> Result<Box<dyn SerialTransport>, SerialError> {
            let (host, device) = tokio::io::duplex(64);
            *self.device.lock().unwrap() = Some(device);
            Ok(Box::new(TrackedTransport {
                inner: host,
                dropped: Arc::clone(&self.dropped),
            }))
        }
    }

    #[tokio::test]
    async fn test_close_releases_transport_immediately() {
        let dropped = Arc::new(AtomicBool::new(false));
        let opener = Arc::new(TrackedOpener {
            dropped: Arc::clone(&dropped),
            device: Mutex::new(None),
        });
        let handle = ConfigHandle::default();
        let (tx, _rx) = message_channel(4);
        let adapter = SerialPortAdapter::new(opener, handle.connection(), handle.runtime(), tx);

        adapter.open().unwrap();
        // Let the reader park on a pending read
        tokio::task::yield_now().await;
        assert!(!dropped.load(Ordering::SeqCst));

        adapter.close().unwrap();
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_close_cancels_pending_write() {
        let (adapter, opener, _handle, _rx) = mock_adapter();
        adapter.open().unwrap();
        // Keep the device end open but never read from it
        let _device = opener.take_device().unwrap();

        let payload = vec![0x55u8; 1024 * 1024];
        let closer = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            adapter.close().unwrap();
        };
        let (result, ()) = tokio::join!(adapter.write(&payload), closer);

        assert_eq!(result, Err(SerialError::Cancelled));
        assert!(!adapter.is_connected());
    }
}
