pub mod interface;
pub mod link;
pub mod protocol;

pub use interface::{
    OpenFlag, OpenedPort, SerialConnector, SerialPortIO, TokioSerialConnector, TransportEvent,
};
pub use link::LinkManager;
pub use protocol::{IrTransmitter, ProtocolSettings, TransmitError};

use serde::{Deserialize, Serialize};

/// Baud rate expected by the IR blaster CLI
pub const BAUD_RATE: u32 = 230400;
/// Line terminator for CLI commands
pub const LINE_TERMINATOR: &str = "\r\n";

#[derive(Debug, Clone)]
pub struct SerialDeviceInfo {
    pub port_name: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// Link lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LinkStatus {
    Closed,
    Opening,
    Open,
    Closing,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            LinkStatus::Closed => "closed",
            LinkStatus::Opening => "opening",
            LinkStatus::Open => "open",
            LinkStatus::Closing => "closing",
        };
        f.write_str(text)
    }
}

/// Events published by the link manager
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    StatusChanged(LinkStatus),
    OpenFailed(String),
    Fault(String),
    ReconnectScheduled(std::time::Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Serial link not ready")]
    LinkNotReady,

    #[error("Failed to open serial port: {0}")]
    TransportOpenFailure(String),

    #[error("Serial write failed: {0}")]
    TransportWriteFailure(String),

    #[error("Link manager stopped")]
    ChannelClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;

/// Enumerate serial ports present on this machine
pub fn list_ports() -> Result<Vec<SerialDeviceInfo>> {
    let ports = serialport::available_ports()?;
    let devices = ports
        .into_iter()
        .map(|port| match port.port_type {
            serialport::SerialPortType::UsbPort(usb_info) => SerialDeviceInfo {
                port_name: port.port_name,
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                serial_number: usb_info.serial_number,
                manufacturer: usb_info.manufacturer,
                product: usb_info.product,
            },
            _ => SerialDeviceInfo {
                port_name: port.port_name,
                vid: None,
                pid: None,
                serial_number: None,
                manufacturer: None,
                product: None,
            },
        })
        .collect();

    Ok(devices)
}
