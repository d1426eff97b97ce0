use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::{Result, SerialError};

/// Unsolicited notifications from an open transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The transport reported a runtime error
    Error(String),
    /// The transport was closed underneath us
    Closed,
}

/// Byte-level access to an open serial transport
#[async_trait::async_trait]
pub trait SerialPortIO: Send {
    /// Write and flush the whole buffer
    async fn send_data(&mut self, data: &[u8]) -> Result<()>;

    fn is_open(&self) -> bool;

    async fn close(&mut self) -> Result<()>;
}

/// Open flag of a transport, shared with readers that do not own the port.
///
/// Whoever notices the port going away clears it before reporting the event,
/// so a cleared flag is visible before the link task has caught up.
#[derive(Debug, Clone)]
pub struct OpenFlag(Arc<AtomicBool>);

impl OpenFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for OpenFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// An open transport together with its event listener
pub struct OpenedPort {
    pub io: Box<dyn SerialPortIO>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    pub open: OpenFlag,
}

/// Opens transports for the link manager
#[async_trait::async_trait]
pub trait SerialConnector: Send + Sync {
    async fn open(&self, port_name: &str, baud_rate: u32) -> Result<OpenedPort>;
}

/// Connector backed by a real serial device
#[derive(Debug, Default, Clone)]
pub struct TokioSerialConnector;

#[async_trait::async_trait]
impl SerialConnector for TokioSerialConnector {
    async fn open(&self, port_name: &str, baud_rate: u32) -> Result<OpenedPort> {
        let stream = tokio_serial::new(port_name, baud_rate)
            .open_native_async()
            .map_err(|e| SerialError::TransportOpenFailure(e.to_string()))?;

        let (reader, writer) = tokio::io::split(stream);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let open = OpenFlag::new();

        let reader_task = tokio::spawn(watch_port(
            port_name.to_string(),
            reader,
            open.clone(),
            events_tx,
        ));

        log::debug!("Opened {} at {} baud", port_name, baud_rate);

        Ok(OpenedPort {
            io: Box::new(SerialPortTransport {
                writer: Some(writer),
                reader_task,
                open: open.clone(),
            }),
            events: events_rx,
            open,
        })
    }
}

/// Drains device output and reports when the port goes away
async fn watch_port(
    port_name: String,
    mut reader: tokio::io::ReadHalf<SerialStream>,
    open: OpenFlag,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut buf = [0u8; 512];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                open.clear();
                let _ = events_tx.send(TransportEvent::Closed);
                break;
            }
            Ok(n) => {
                log::trace!("{} <- {:?}", port_name, String::from_utf8_lossy(&buf[..n]));
            }
            Err(e) => {
                open.clear();
                let _ = events_tx.send(TransportEvent::Error(e.to_string()));
                break;
            }
        }
    }
}

struct SerialPortTransport {
    writer: Option<WriteHalf<SerialStream>>,
    reader_task: JoinHandle<()>,
    open: OpenFlag,
}

#[async_trait::async_trait]
impl SerialPortIO for SerialPortTransport {
    async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(SerialError::LinkNotReady)?;

        writer.write_all(data).await?;
        writer.flush().await?;

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.writer.is_some() && self.open.is_set()
    }

    async fn close(&mut self) -> Result<()> {
        self.open.clear();
        self.reader_task.abort();
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

impl Drop for SerialPortTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
