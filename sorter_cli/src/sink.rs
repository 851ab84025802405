//! Telemetry listener that writes each sorted profile to stdout.

use std::io::Write;
use std::time::Instant;

use sorter_traits::{HwResult, TelemetrySink};

pub struct StdoutTelemetry {
    json: bool,
    started: Instant,
}

impl StdoutTelemetry {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            started: Instant::now(),
        }
    }

    fn line(&self, profile: &str) -> String {
        if self.json {
            serde_json::json!({
                "event": "sorted",
                "profile": profile,
                "t_ms": u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            })
            .to_string()
        } else {
            format!("sorted: {profile}")
        }
    }
}

impl TelemetrySink for StdoutTelemetry {
    fn report(&mut self, profile: &str) -> HwResult<()> {
        let line = self.line(profile);
        // a closed pipe refuses the report; the reporter retries it
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_line_has_event_and_profile() {
        let s = StdoutTelemetry::new(true);
        let v: serde_json::Value = serde_json::from_str(&s.line("Red 3L")).unwrap();
        assert_eq!(v["event"], "sorted");
        assert_eq!(v["profile"], "Red 3L");
        assert!(v["t_ms"].is_u64());
    }

    #[test]
    fn text_line() {
        assert_eq!(StdoutTelemetry::new(false).line("Tan 2L"), "sorted: Tan 2L");
    }
}
