//! Audio codec health: crash flags and speaker impedance.

use crate::collect::{hardware_failed, FailureCode, HardwareType};
use crate::sched::{CollectCx, Collector};
use crate::source::read_int;
use ks_common::{Error, EventId, Result, TelemetryEvent, TelemetryValue};
use tracing::{debug, warn};

/// Reads the per-codec crash flags and reports a hardware failure for
/// each codec whose flag is nonzero. Location 0 is the primary codec,
/// location 1 the secondary.
pub struct CodecFailureCollector {
    codec_state: Option<String>,
    codec1_state: Option<String>,
}

impl CodecFailureCollector {
    pub fn new(codec_state: Option<String>, codec1_state: Option<String>) -> Self {
        Self {
            codec_state,
            codec1_state,
        }
    }
}

impl Collector for CodecFailureCollector {
    fn name(&self) -> &'static str {
        "codec_failure"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        for (location, path) in [(0, &self.codec_state), (1, &self.codec1_state)] {
            let Some(path) = path else {
                debug!(location, "codec state path not configured");
                continue;
            };
            match read_int(cx.source, path) {
                Ok(0) => {}
                Ok(_) => {
                    let event =
                        hardware_failed(HardwareType::Codec, location, FailureCode::Complete);
                    cx.sink.submit(&event)?;
                }
                Err(e) => warn!(path = %path, error = %e, "failed to read codec state"),
            }
        }
        Ok(())
    }
}

/// Reads measured speaker impedance, one comma-separated milli-precision
/// ohm value per speaker, and reports each in milliohms.
pub struct SpeakerImpedanceCollector {
    path: Option<String>,
}

impl SpeakerImpedanceCollector {
    pub fn new(path: Option<String>) -> Self {
        Self { path }
    }
}

impl Collector for SpeakerImpedanceCollector {
    fn name(&self) -> &'static str {
        "speaker_impedance"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        let Some(path) = &self.path else {
            debug!("speaker impedance path not configured");
            return Ok(());
        };
        let text = cx.source.read_text(path)?;
        for (location, field) in text.trim().split(',').enumerate() {
            let ohms: f32 = field.trim().parse().map_err(|_| {
                Error::malformed(path, format!("expected float impedance, got {field:?}"))
            })?;
            let event = TelemetryEvent::new(
                EventId::SpeakerImpedance,
                vec![
                    TelemetryValue::Int(location as i32),
                    TelemetryValue::Int((ohms * 1000.0) as i32),
                ],
            );
            cx.sink.submit(&event)?;
        }
        Ok(())
    }
}
