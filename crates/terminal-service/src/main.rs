//! Serial Monitor - Headless Terminal
//!
//! Usage: `serial-monitor [settings.toml]`
//!
//! Prints every received message, sends each stdin line to the port and
//! exits on Ctrl-C, end of input or loss of the connection.

use message_format::format_message;
use serial_protocol::{ConfigHandle, NativePortOpener};
use std::path::PathBuf;
use std::sync::Arc;
use terminal_service::{
    init_logging, MessageLog, SerialService, ServiceEvent, Settings, TracingMessageLog,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(path.as_deref())?;
    init_logging(&settings.log_level)?;

    info!("=== Serial Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Port {} at {} baud",
        settings.connection.port_name, settings.connection.baud_rate
    );

    let config = ConfigHandle::new(settings.connection.clone(), settings.runtime.clone());
    let message_log = if settings.log_messages {
        let log = TracingMessageLog::new();
        log.start();
        Some(Arc::new(log) as Arc<dyn MessageLog>)
    } else {
        None
    };

    let service = SerialService::new(Arc::new(NativePortOpener), &config, &settings.service, message_log)?;
    let mut events = service.subscribe();
    service.connect()?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            line = input.next_line() => match line? {
                Some(line) => {
                    if let Err(e) = service.write(&line).await {
                        warn!("Write failed: {}", e);
                    }
                }
                None => break,
            },
            event = events.recv() => match event {
                Ok(ServiceEvent::MessageReceived(message)) => {
                    println!("{}", format_message(&message, service.encoding()));
                }
                Ok(ServiceEvent::ConnectionLost { reason }) => {
                    error!("Connection lost: {}", reason);
                    break;
                }
                Ok(ServiceEvent::BufferUpdated(_)) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Display skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    service.shutdown();
    Ok(())
}
