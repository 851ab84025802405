//! Test and helper doubles for sorter_core.

use std::sync::{Arc, Mutex};

use sorter_traits::{HwResult, TelemetrySink};

/// Accepts and discards every report; used when no listener is attached.
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn report(&mut self, _profile: &str) -> HwResult<()> {
        Ok(())
    }
}

/// Keeps every accepted report; clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingTelemetry {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.log.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn report(&mut self, profile: &str) -> HwResult<()> {
        self.log
            .lock()
            .map_err(|_| std::io::Error::other("telemetry log poisoned"))?
            .push(profile.to_owned());
        Ok(())
    }
}
