#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use ir_fan_lib::fan::{IntentState, StateSink};
use ir_fan_lib::ir::{FanSignal, WaveformCatalog, WaveformDescriptor};
use ir_fan_lib::serial::{
    OpenFlag, OpenedPort, SerialConnector, SerialError, SerialPortIO, TransportEvent,
};

#[derive(Default)]
struct DeviceState {
    writes: Vec<String>,
    write_attempts: usize,
    fail_write_at: Option<usize>,
    open_attempts: usize,
    failing_opens: usize,
    open_handles: usize,
    event_tx: Option<mpsc::UnboundedSender<TransportEvent>>,
    port_open: Option<OpenFlag>,
}

/// In-memory stand-in for the IR blaster
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn SerialConnector> {
        Arc::new(MockConnector {
            device: self.clone(),
        })
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn write_attempts(&self) -> usize {
        self.state.lock().unwrap().write_attempts
    }

    pub fn open_attempts(&self) -> usize {
        self.state.lock().unwrap().open_attempts
    }

    /// Handles opened and not yet closed
    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().open_handles
    }

    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().unwrap().failing_opens = count;
    }

    /// Fail the n-th write attempt (1-based, counted over the device's lifetime)
    pub fn fail_write_at(&self, attempt: usize) {
        self.state.lock().unwrap().fail_write_at = Some(attempt);
    }

    /// Simulate the cable being pulled
    pub fn drop_connection(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(open) = state.port_open.take() {
            open.clear();
        }
        if let Some(tx) = state.event_tx.as_ref() {
            let _ = tx.send(TransportEvent::Closed);
        }
    }

    pub fn raise_error(&self, message: &str) {
        let state = self.state.lock().unwrap();
        if let Some(tx) = state.event_tx.as_ref() {
            let _ = tx.send(TransportEvent::Error(message.to_string()));
        }
    }
}

struct MockConnector {
    device: MockDevice,
}

#[async_trait::async_trait]
impl SerialConnector for MockConnector {
    async fn open(&self, port_name: &str, _baud_rate: u32) -> Result<OpenedPort, SerialError> {
        let mut state = self.device.state.lock().unwrap();
        state.open_attempts += 1;
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(SerialError::TransportOpenFailure(format!("{} busy", port_name)));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let open = OpenFlag::new();
        state.event_tx = Some(tx);
        state.port_open = Some(open.clone());
        state.open_handles += 1;

        Ok(OpenedPort {
            io: Box::new(MockPort {
                device: self.device.clone(),
                open: open.clone(),
                closed: false,
            }),
            events: rx,
            open,
        })
    }
}

struct MockPort {
    device: MockDevice,
    open: OpenFlag,
    closed: bool,
}

#[async_trait::async_trait]
impl SerialPortIO for MockPort {
    async fn send_data(&mut self, data: &[u8]) -> Result<(), SerialError> {
        let mut state = self.device.state.lock().unwrap();
        state.write_attempts += 1;
        if state.fail_write_at == Some(state.write_attempts) {
            return Err(SerialError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "write rejected",
            )));
        }
        state.writes.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed && self.open.is_set()
    }

    async fn close(&mut self) -> Result<(), SerialError> {
        self.closed = true;
        self.open.clear();
        Ok(())
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        if let Ok(mut state) = self.device.state.lock() {
            state.open_handles -= 1;
        }
    }
}

/// Records every snapshot it receives
#[derive(Default)]
pub struct RecordingSink {
    states: Mutex<Vec<IntentState>>,
}

impl RecordingSink {
    pub fn states(&self) -> Vec<IntentState> {
        self.states.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StateSink for RecordingSink {
    async fn store(&self, state: &IntentState) {
        self.states.lock().unwrap().push(*state);
    }
}

/// Catalog whose fan signals are told apart by carrier frequency
pub fn fan_catalog() -> WaveformCatalog {
    let waveforms = FanSignal::ALL.iter().map(|signal| WaveformDescriptor {
        name: signal.name().to_string(),
        frequency_hz: frequency_of(*signal),
        duty_cycle_percent: 33.0,
        samples: vec![9000, 4500, 560, 1690, 560],
    });
    WaveformCatalog::new(waveforms).unwrap()
}

pub fn frequency_of(signal: FanSignal) -> u32 {
    match signal {
        FanSignal::Off => 36000,
        FanSignal::Low => 37000,
        FanSignal::Medium => 38000,
        FanSignal::High => 39000,
    }
}

/// Which fan signal a written command line carries
pub fn signal_of(line: &str) -> Option<FanSignal> {
    let frequency: u32 = line
        .split_whitespace()
        .find_map(|part| part.strip_prefix("F:"))?
        .parse()
        .ok()?;
    FanSignal::ALL
        .into_iter()
        .find(|signal| frequency_of(*signal) == frequency)
}

/// Samples carried by a written command line
pub fn samples_of(line: &str) -> Vec<u32> {
    line.trim_end()
        .split_whitespace()
        .skip(5)
        .map(|s| s.parse().unwrap())
        .collect()
}
