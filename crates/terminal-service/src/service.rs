//! Serial Service
//!
//! Facade used by the presentation layer. A single drain task consumes the
//! port's message channel in arrival order and, for each message:
//!
//! 1. counts it in the rate monitor
//! 2. hands the formatted line to the message log, if one is active
//! 3. appends it to the history
//! 4. publishes [`ServiceEvent::BufferUpdated`] and [`ServiceEvent::MessageReceived`]
//!
//! Only events of the session accepted by the last [`SerialService::connect`]
//! are delivered. Disconnecting withdraws that acceptance under the same lock
//! the drain task delivers under, so frames still queued from a closed
//! session never reach the cleared history.
//!
//! Events go out on a broadcast channel. Callback listeners each get their own
//! receiver and task, and every call runs on the blocking pool, so a slow
//! listener lags and skips events instead of holding up the drain task or
//! other listeners.

use crate::error::ServiceError;
use crate::message_log::MessageLog;
use crate::processor::MessageProcessor;
use crate::rate::RateMonitor;
use crate::settings::ServiceSettings;
use message_format::{format_message, DisplayEncoding};
use serial_protocol::{
    message_channel, parse_to_bytes, ConfigHandle, Message, MessageReceiver, PortEvent,
    PortOpener, RuntimeConfig, SerialError, SerialPortAdapter, SessionEvent, SessionId,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Notification published by the service
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// A message arrived from the port and is in the history
    MessageReceived(Message),
    /// The rendered history changed; carries the full formatted text
    BufferUpdated(Arc<str>),
    /// The port stopped delivering data without a user disconnect
    ConnectionLost { reason: String },
}

/// State shared between the facade and its tasks
struct Shared {
    /// Session whose events are delivered; `None` while disconnected
    accepted: Mutex<Option<SessionId>>,
    processor: MessageProcessor,
    rate: RateMonitor,
    events: broadcast::Sender<ServiceEvent>,
    message_log: Option<Arc<dyn MessageLog>>,
}

impl Shared {
    fn handle(&self, SessionEvent { session, event }: SessionEvent) {
        let accepted = self.accepted();
        if *accepted != Some(session) {
            trace!("Dropping event of closed session {}", session);
            return;
        }

        match event {
            PortEvent::Message(message) => self.deliver(message),
            PortEvent::ConnectionLost { reason } => {
                warn!("Connection lost: {}", reason);
                let _ = self.events.send(ServiceEvent::ConnectionLost { reason });
            }
        }
    }

    fn deliver(&self, message: Message) {
        self.rate.register_message();
        metrics::counter!("serial_messages_received_total").increment(1);
        metrics::gauge!("serial_message_rate").set(self.rate.current_rate());

        if let Some(log) = &self.message_log {
            if log.is_active() {
                log.write_line(&format_message(&message, self.processor.encoding()));
            }
        }

        self.processor.process(message.clone());
        self.publish_buffer();
        // No subscribers is not an error
        let _ = self.events.send(ServiceEvent::MessageReceived(message));
    }

    fn record_sent(&self, message: Message) {
        metrics::counter!("serial_messages_sent_total").increment(1);
        self.processor.process(message);
        self.publish_buffer();
    }

    fn record_error(&self, text: String) {
        metrics::counter!("serial_errors_total").increment(1);
        self.processor.process(Message::error(text));
        self.publish_buffer();
    }

    fn accepted(&self) -> MutexGuard<'_, Option<SessionId>> {
        self.accepted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render and publish the history, skipped when nobody listens
    fn publish_buffer(&self) {
        if self.events.receiver_count() == 0 {
            return;
        }
        let text: Arc<str> = self.processor.render().into();
        let _ = self.events.send(ServiceEvent::BufferUpdated(text));
    }
}

/// Serial terminal service
pub struct SerialService {
    adapter: SerialPortAdapter,
    runtime_config: watch::Receiver<RuntimeConfig>,
    shared: Arc<Shared>,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl SerialService {
    /// Create the service and start its drain task
    ///
    /// Must be called from within a Tokio runtime; later calls may come from
    /// any thread.
    pub fn new(
        opener: Arc<dyn PortOpener>,
        config: &ConfigHandle,
        settings: &ServiceSettings,
        message_log: Option<Arc<dyn MessageLog>>,
    ) -> Result<Self, ServiceError> {
        let runtime = Handle::try_current().map_err(|e| ServiceError::NoRuntime(e.to_string()))?;

        let processor = MessageProcessor::new(settings.buffer_capacity, settings.display_encoding)?;
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let shared = Arc::new(Shared {
            accepted: Mutex::new(None),
            processor,
            rate: RateMonitor::new(),
            events,
            message_log,
        });

        let (sender, receiver) = message_channel(settings.channel_capacity);
        let adapter = SerialPortAdapter::new(opener, config.connection(), config.runtime(), sender);

        let shutdown = CancellationToken::new();
        runtime.spawn(drain_loop(receiver, Arc::clone(&shared), shutdown.clone()));

        info!(
            "Serial service ready (history: {}, encoding: {})",
            settings.buffer_capacity, settings.display_encoding
        );

        Ok(Self {
            adapter,
            runtime_config: config.runtime(),
            shared,
            runtime,
            shutdown,
        })
    }

    /// Open the port with the current connection parameters
    ///
    /// A failure is also recorded in the history as an error message.
    pub fn connect(&self) -> Result<(), SerialError> {
        let _runtime = self.runtime.enter();
        let mut accepted = self.shared.accepted();
        match self.adapter.open() {
            Ok(session) => {
                *accepted = Some(session);
                self.shared.rate.reset();
                Ok(())
            }
            Err(e) => {
                drop(accepted);
                self.shared.record_error(format!("Connect failed: {}", e));
                Err(e)
            }
        }
    }

    /// Close the port, then clear the history and the rate
    ///
    /// Frames of the closed session still in flight are discarded.
    pub fn disconnect(&self) -> Result<(), SerialError> {
        {
            let mut accepted = self.shared.accepted();
            self.adapter.close()?;
            *accepted = None;
            self.shared.processor.clear();
            self.shared.rate.reset();
        }
        self.shared.publish_buffer();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.adapter.is_connected()
    }

    /// Parse `text` (with `$XX` escapes) and send it to the port
    ///
    /// With local echo enabled the sent bytes are added to the history. A
    /// transport failure is recorded there as an error message.
    pub async fn write(&self, text: &str) -> Result<(), SerialError> {
        let bytes = parse_to_bytes(text);
        if let Err(e) = self.adapter.write(&bytes).await {
            if matches!(e, SerialError::Write(_)) {
                self.shared.record_error(format!("Write failed: {}", e));
            }
            return Err(e);
        }

        let local_echo = self.runtime_config.borrow().local_echo;
        if local_echo {
            self.shared.record_sent(Message::sent(bytes));
        }
        Ok(())
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.shared.events.subscribe()
    }

    /// Invoke `listener` for every event until the service shuts down
    ///
    /// Calls are made one at a time, in order, on the blocking thread pool.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(ServiceEvent) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let mut events = self.shared.events.subscribe();
        let shutdown = self.shutdown.clone();

        self.runtime.spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => event,
                };

                match event {
                    Ok(event) => {
                        let listener = Arc::clone(&listener);
                        let call = tokio::task::spawn_blocking(move || (*listener)(event));
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => break,
                            done = call => {
                                if let Err(e) = done {
                                    warn!("Listener failed: {}", e);
                                }
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Listener lagging, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Change how the history is rendered
    pub fn set_encoding(&self, encoding: DisplayEncoding) {
        if self.shared.processor.set_encoding(encoding) {
            debug!("Display encoding set to {}", encoding);
            self.shared.publish_buffer();
        }
    }

    pub fn encoding(&self) -> DisplayEncoding {
        self.shared.processor.encoding()
    }

    /// Whole history rendered with the current encoding
    pub fn formatted_buffer(&self) -> String {
        self.shared.processor.render()
    }

    /// Copy of the history, oldest first
    pub fn snapshot(&self) -> Vec<Message> {
        self.shared.processor.snapshot()
    }

    /// Empty the history
    pub fn clear_buffer(&self) {
        self.shared.processor.clear();
        self.shared.publish_buffer();
    }

    pub fn buffer_capacity(&self) -> usize {
        self.shared.processor.capacity()
    }

    /// Messages per second over the last completed window
    pub fn message_rate(&self) -> f64 {
        self.shared.rate.current_rate()
    }

    /// Stop the drain task and listeners and close any open connection
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("Shutting down serial service");
        let mut accepted = self.shared.accepted();
        let _ = self.adapter.close();
        *accepted = None;
        drop(accepted);
        self.shutdown.cancel();
    }
}

impl Drop for SerialService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn drain_loop(mut receiver: MessageReceiver, shared: Arc<Shared>, shutdown: CancellationToken) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = receiver.recv() => event,
        };

        match event {
            Some(event) => shared.handle(event),
            None => break,
        }
    }
    debug!("Message drain stopped");
}
