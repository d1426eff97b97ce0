use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};

use super::interface::{OpenFlag, SerialConnector, SerialPortIO, TransportEvent};
use super::{LinkEvent, LinkStatus, Result, SerialError};

/// Default delay between reconnect attempts
pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(5000);

enum LinkCommand {
    Open {
        port_name: String,
        baud_rate: u32,
        responder: oneshot::Sender<Result<()>>,
    },
    Write {
        data: Vec<u8>,
        responder: oneshot::Sender<Result<()>>,
    },
    Close {
        responder: oneshot::Sender<()>,
    },
}

/// Handle to the task that owns the serial link.
///
/// The task is the only place the transport is written to or closed. It keeps
/// the link open by rescheduling an open attempt every `reconnect_interval`
/// after a failure or an unsolicited close, until the link is explicitly closed.
/// Clones share the same task.
#[derive(Clone)]
pub struct LinkManager {
    cmd_tx: mpsc::Sender<LinkCommand>,
    status_rx: watch::Receiver<LinkStatus>,
    port_open_rx: watch::Receiver<Option<OpenFlag>>,
    events_tx: broadcast::Sender<LinkEvent>,
}

impl LinkManager {
    pub fn spawn(connector: Arc<dyn SerialConnector>, reconnect_interval: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(LinkStatus::Closed);
        let (port_open_tx, port_open_rx) = watch::channel(None);
        let (events_tx, _events_rx) = broadcast::channel(64);

        let actor = LinkActor {
            connector,
            reconnect_interval,
            target: None,
            port: None,
            port_events: None,
            reconnect_at: None,
            status_tx,
            port_open_tx,
            events_tx: events_tx.clone(),
        };
        tokio::spawn(actor.run(cmd_rx));

        Self {
            cmd_tx,
            status_rx,
            port_open_rx,
            events_tx,
        }
    }

    /// Open the link. A failed attempt is reported here and retried in the background.
    pub async fn open(&self, port_name: &str, baud_rate: u32) -> Result<()> {
        let (responder, rx) = oneshot::channel();
        self.cmd_tx
            .send(LinkCommand::Open {
                port_name: port_name.to_string(),
                baud_rate,
                responder,
            })
            .await
            .map_err(|_| SerialError::ChannelClosed)?;
        rx.await.map_err(|_| SerialError::ChannelClosed)?
    }

    /// Write raw bytes if the link is ready
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        if !self.is_ready() {
            return Err(SerialError::LinkNotReady);
        }

        let (responder, rx) = oneshot::channel();
        self.cmd_tx
            .send(LinkCommand::Write {
                data: data.to_vec(),
                responder,
            })
            .await
            .map_err(|_| SerialError::ChannelClosed)?;
        rx.await.map_err(|_| SerialError::ChannelClosed)?
    }

    /// Close the link and stop reconnecting
    pub async fn close(&self) -> Result<()> {
        let (responder, rx) = oneshot::channel();
        self.cmd_tx
            .send(LinkCommand::Close { responder })
            .await
            .map_err(|_| SerialError::ChannelClosed)?;
        rx.await.map_err(|_| SerialError::ChannelClosed)
    }

    pub fn status(&self) -> LinkStatus {
        *self.status_rx.borrow()
    }

    /// `Open` and the transport itself still reports open. The transport flag
    /// drops as soon as the port goes away, ahead of the task moving to `Closed`.
    pub fn is_ready(&self) -> bool {
        self.status() == LinkStatus::Open
            && self
                .port_open_rx
                .borrow()
                .as_ref()
                .map_or(false, OpenFlag::is_set)
    }

    pub fn status_receiver(&self) -> watch::Receiver<LinkStatus> {
        self.status_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events_tx.subscribe()
    }
}

struct LinkActor {
    connector: Arc<dyn SerialConnector>,
    reconnect_interval: Duration,
    target: Option<(String, u32)>,
    port: Option<Box<dyn SerialPortIO>>,
    port_events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    reconnect_at: Option<Instant>,
    status_tx: watch::Sender<LinkStatus>,
    port_open_tx: watch::Sender<Option<OpenFlag>>,
    events_tx: broadcast::Sender<LinkEvent>,
}

impl LinkActor {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<LinkCommand>) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                event = next_transport_event(&mut self.port_events) => {
                    self.handle_transport_event(event).await;
                }
                _ = reconnect_deadline(self.reconnect_at) => {
                    self.reconnect_at = None;
                    log::info!("Attempting to reconnect to serial port...");
                    let _ = self.try_open().await;
                }
            }
        }

        self.teardown().await;
        self.set_status(LinkStatus::Closed);
        log::debug!("Link manager stopped");
    }

    async fn handle_command(&mut self, cmd: LinkCommand) {
        match cmd {
            LinkCommand::Open {
                port_name,
                baud_rate,
                responder,
            } => {
                let target = (port_name, baud_rate);
                let result = if self.is_ready() && self.target.as_ref() == Some(&target) {
                    Ok(())
                } else {
                    self.target = Some(target);
                    self.try_open().await
                };
                let _ = responder.send(result);
            }
            LinkCommand::Write { data, responder } => {
                let ready = self.is_ready();
                let result = match self.port.as_mut() {
                    Some(port) if ready => port
                        .send_data(&data)
                        .await
                        .map_err(|e| SerialError::TransportWriteFailure(e.to_string())),
                    _ => Err(SerialError::LinkNotReady),
                };
                let _ = responder.send(result);
            }
            LinkCommand::Close { responder } => {
                self.target = None;
                self.reconnect_at = None;
                if self.port.is_some() {
                    self.set_status(LinkStatus::Closing);
                }
                self.teardown().await;
                self.set_status(LinkStatus::Closed);
                log::info!("Serial link closed");
                let _ = responder.send(());
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        let reason = match event {
            TransportEvent::Error(message) => {
                log::error!("Serial port error: {}", message);
                message
            }
            TransportEvent::Closed => {
                log::warn!("Serial port closed");
                "port closed".to_string()
            }
        };
        let _ = self.events_tx.send(LinkEvent::Fault(reason));

        self.teardown().await;
        self.set_status(LinkStatus::Closed);
        self.schedule_reconnect();
    }

    async fn try_open(&mut self) -> Result<()> {
        let Some((port_name, baud_rate)) = self.target.clone() else {
            return Err(SerialError::LinkNotReady);
        };

        self.teardown().await;
        self.set_status(LinkStatus::Opening);

        match self.connector.open(&port_name, baud_rate).await {
            Ok(opened) => {
                self.port = Some(opened.io);
                self.port_events = Some(opened.events);
                self.port_open_tx.send_replace(Some(opened.open));
                self.reconnect_at = None;
                self.set_status(LinkStatus::Open);
                log::info!("Serial port {} opened successfully", port_name);
                Ok(())
            }
            Err(e) => {
                let message = match e {
                    SerialError::TransportOpenFailure(message) => message,
                    other => other.to_string(),
                };
                log::error!("Failed to open serial port {}: {}", port_name, message);
                let _ = self.events_tx.send(LinkEvent::OpenFailed(message.clone()));
                self.set_status(LinkStatus::Closed);
                self.schedule_reconnect();
                Err(SerialError::TransportOpenFailure(message))
            }
        }
    }

    /// Arm the reconnect timer unless one is already pending
    fn schedule_reconnect(&mut self) {
        if self.target.is_none() || self.reconnect_at.is_some() {
            return;
        }
        self.reconnect_at = Some(Instant::now() + self.reconnect_interval);
        log::info!("Reconnect scheduled in {:?}", self.reconnect_interval);
        let _ = self
            .events_tx
            .send(LinkEvent::ReconnectScheduled(self.reconnect_interval));
    }

    /// Drop the listener and close the handle before anything else touches the port
    async fn teardown(&mut self) {
        self.port_open_tx.send_replace(None);
        self.port_events = None;
        if let Some(mut port) = self.port.take() {
            if !port.is_open() {
                return;
            }
            if let Err(e) = port.close().await {
                log::error!("Error cleaning up serial port: {}", e);
            }
        }
    }

    fn is_ready(&self) -> bool {
        *self.status_tx.borrow() == LinkStatus::Open
            && self.port.as_ref().map_or(false, |port| port.is_open())
    }

    fn set_status(&self, status: LinkStatus) {
        let previous = self.status_tx.send_replace(status);
        if previous != status {
            log::debug!("Link status {} -> {}", previous, status);
            let _ = self.events_tx.send(LinkEvent::StatusChanged(status));
        }
    }
}

async fn next_transport_event(
    events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> TransportEvent {
    match events {
        Some(rx) => rx.recv().await.unwrap_or(TransportEvent::Closed),
        None => std::future::pending().await,
    }
}

async fn reconnect_deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
