use std::time::Duration;

use super::{LinkManager, SerialError, LINE_TERMINATOR};
use crate::ir::WaveformDescriptor;

/// The device accepts up to 512 raw samples per command, but long lines get
/// mangled on the way over serial, so fragments are kept well below that.
pub const MAX_FRAGMENT_SAMPLES: usize = 512 / 8;
/// The device cannot buffer back-to-back fragments
pub const FRAGMENT_PACING: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error("Serial link not ready")]
    LinkNotReady,

    #[error("Failed to send fragment {index}/{total}: {source}")]
    FragmentFailed {
        index: usize,
        total: usize,
        #[source]
        source: SerialError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSettings {
    pub max_fragment_samples: usize,
    pub pacing: Duration,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            max_fragment_samples: MAX_FRAGMENT_SAMPLES,
            pacing: FRAGMENT_PACING,
        }
    }
}

/// Raw IR transmission over the device's text CLI.
///
/// A waveform is sent as one `ir tx RAW` line per fragment, strictly in order,
/// pausing after every write. The first failing fragment ends the waveform.
#[derive(Clone)]
pub struct IrTransmitter {
    link: LinkManager,
    settings: ProtocolSettings,
}

impl IrTransmitter {
    pub fn new(link: LinkManager, settings: ProtocolSettings) -> Self {
        Self { link, settings }
    }

    /// Send a waveform, fragment by fragment
    pub async fn send(&self, waveform: &WaveformDescriptor) -> Result<(), TransmitError> {
        log::debug!("Sending IR signal: {}", waveform.name);
        if !self.link.is_ready() {
            log::warn!("Serial port is not open. Cannot send IR signal {}", waveform.name);
            return Err(TransmitError::LinkNotReady);
        }

        let total = fragment_count(waveform.samples.len(), self.settings.max_fragment_samples);
        let fragments = fragment_samples(&waveform.samples, self.settings.max_fragment_samples);

        for (i, fragment) in fragments.enumerate() {
            let index = i + 1;
            let command =
                format_command(waveform.frequency_hz, waveform.duty_cycle_percent, fragment);

            if let Err(source) = self.link.write(command.as_bytes()).await {
                log::error!(
                    "Failed to send chunk {}/{} of IR signal {}: {}",
                    index,
                    total,
                    waveform.name,
                    source
                );
                return Err(TransmitError::FragmentFailed {
                    index,
                    total,
                    source,
                });
            }

            tokio::time::sleep(self.settings.pacing).await;
        }

        log::debug!("IR signal {} sent in {} fragment(s)", waveform.name, total);
        Ok(())
    }
}

/// Split samples into consecutive fragments of at most `max` values
pub fn fragment_samples(samples: &[u32], max: usize) -> std::slice::Chunks<'_, u32> {
    samples.chunks(max.max(1))
}

pub fn fragment_count(len: usize, max: usize) -> usize {
    len.div_ceil(max.max(1))
}

/// Build one `ir tx RAW` command line, terminator included
pub fn format_command(frequency_hz: u32, duty_cycle_percent: f64, samples: &[u32]) -> String {
    let data = samples
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "ir tx RAW F:{} DC:{} {}{}",
        frequency_hz,
        format_duty_cycle(duty_cycle_percent),
        data,
        LINE_TERMINATOR
    )
}

/// At most two decimals, no trailing zeros
pub fn format_duty_cycle(duty_cycle_percent: f64) -> String {
    let text = format!("{:.2}", duty_cycle_percent);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
