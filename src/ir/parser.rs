use super::{CatalogError, Result, WaveformDescriptor};

/// Fields collected for one `name:` block
struct PendingSignal {
    name: String,
    line: usize,
    frequency_hz: Option<u32>,
    duty_cycle_percent: Option<f64>,
    samples: Option<Vec<u32>>,
}

impl PendingSignal {
    fn finish(self) -> Option<WaveformDescriptor> {
        match (self.frequency_hz, self.duty_cycle_percent, self.samples) {
            (Some(frequency_hz), Some(duty_cycle_percent), Some(samples)) => {
                Some(WaveformDescriptor {
                    name: self.name,
                    frequency_hz,
                    duty_cycle_percent,
                    samples,
                })
            }
            _ => {
                log::warn!(
                    "Skipping IR signal {} (line {}): not a raw signal",
                    self.name,
                    self.line
                );
                None
            }
        }
    }
}

/// Parse a line-oriented IR descriptor file.
///
/// Every `name:` line opens a new signal; `frequency:`, `duty_cycle:` (a
/// fraction, stored as percent) and `data:` fill it in. Comments and unknown
/// keys are ignored, as is anything before the first `name:`.
pub fn parse_ir_file(text: &str) -> Result<Vec<WaveformDescriptor>> {
    let mut signals = Vec::new();
    let mut current: Option<PendingSignal> = None;

    for (i, raw_line) in text.lines().enumerate() {
        let line_number = i + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        if key.trim() == "name" {
            if let Some(signal) = current.take().and_then(PendingSignal::finish) {
                signals.push(signal);
            }
            current = Some(PendingSignal {
                name: value.to_string(),
                line: line_number,
                frequency_hz: None,
                duty_cycle_percent: None,
                samples: None,
            });
            continue;
        }

        let Some(signal) = current.as_mut() else {
            continue;
        };

        match key.trim() {
            "frequency" => {
                signal.frequency_hz = Some(parse_number(value, line_number)?);
            }
            "duty_cycle" => {
                let fraction: f64 = parse_number(value, line_number)?;
                signal.duty_cycle_percent = Some(fraction * 100.0);
            }
            "data" => {
                let samples = value
                    .split_whitespace()
                    .map(|v| parse_number(v, line_number))
                    .collect::<Result<Vec<u32>>>()?;
                signal.samples = Some(samples);
            }
            _ => {}
        }
    }

    if let Some(signal) = current.and_then(PendingSignal::finish) {
        signals.push(signal);
    }

    Ok(signals)
}

fn parse_number<T: std::str::FromStr>(value: &str, line: usize) -> Result<T> {
    value.parse().map_err(|_| CatalogError::Parse {
        line,
        message: format!("invalid number '{}'", value),
    })
}
