#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]
//! Operator summary: what the line has sorted so far.
//!
//! The display ticker hands a [`CountsSnapshot`] to [`Summary::new`]; the
//! result renders as an aligned text block for the console or as one JSON
//! object for `--json` runs.

use std::fmt;

use serde::Serialize;
use sorter_core::CountsSnapshot;

/// Width of the proportional bar next to each profile count.
const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileLine {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub uptime_ms: u64,
    pub profiles: Vec<ProfileLine>,
    pub total_sorted: u64,
    pub rescans: u64,
    pub rejects: u64,
    /// Indeterminate results (rescans + rejects) per sorted object, in
    /// percent. Zero until the first object is sorted; can exceed 100.
    pub indeterminate_pct: f64,
}

impl Summary {
    pub fn new(snap: &CountsSnapshot, uptime_ms: u64) -> Self {
        let total_sorted = snap.total_sorted();
        let indeterminate = snap.indeterminate();
        let indeterminate_pct = if total_sorted == 0 {
            0.0
        } else {
            (indeterminate as f64 * 1000.0 / total_sorted as f64).round() / 10.0
        };
        Self {
            uptime_ms,
            profiles: snap
                .sorted
                .iter()
                .map(|(name, count)| ProfileLine {
                    name: name.clone(),
                    count: *count,
                })
                .collect(),
            total_sorted,
            rescans: snap.rescans,
            rejects: snap.rejects,
            indeterminate_pct,
        }
    }

    /// Objects sorted per minute of uptime.
    pub fn rate_per_min(&self) -> f64 {
        if self.uptime_ms == 0 {
            return 0.0;
        }
        (self.total_sorted as f64 * 60_000.0 / self.uptime_ms as f64 * 10.0).round() / 10.0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn bar(count: u64, max: u64) -> String {
    let filled = if max == 0 {
        0
    } else {
        usize::try_from(count.saturating_mul(BAR_WIDTH as u64) / max).unwrap_or(BAR_WIDTH)
    };
    let mut s = "#".repeat(filled);
    s.push_str(&".".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)));
    s
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.uptime_ms / 1000;
        writeln!(
            f,
            "--- sorted after {:02}:{:02}:{:02} ---",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        )?;
        let width = self
            .profiles
            .iter()
            .map(|p| p.name.len())
            .max()
            .unwrap_or(0);
        let max = self.profiles.iter().map(|p| p.count).max().unwrap_or(0);
        for p in &self.profiles {
            writeln!(
                f,
                "{:<width$}  {}  {}",
                p.name,
                bar(p.count, max),
                p.count
            )?;
        }
        writeln!(
            f,
            "total sorted: {} ({:.1}/min)",
            self.total_sorted,
            self.rate_per_min()
        )?;
        writeln!(
            f,
            "rescans+rejects: {} (rescans {}, rejects {})",
            self.rescans + self.rejects,
            self.rescans,
            self.rejects
        )?;
        write!(f, "indeterminate: {:.1}%", self.indeterminate_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn snap(sorted: &[(&str, u64)], rescans: u64, rejects: u64) -> CountsSnapshot {
        CountsSnapshot {
            sorted: sorted.iter().map(|(n, c)| ((*n).to_owned(), *c)).collect(),
            rescans,
            rejects,
        }
    }

    #[test]
    fn empty_line_renders_zeroes() {
        let s = Summary::new(&snap(&[("Black 2L", 0)], 0, 0), 0);
        assert_eq!(s.indeterminate_pct, 0.0);
        assert_eq!(s.rate_per_min(), 0.0);
        let text = s.to_string();
        assert!(text.contains("Black 2L  ....................  0"));
        assert!(text.contains("total sorted: 0"));
        assert!(text.ends_with("indeterminate: 0.0%"));
    }

    #[test]
    fn counts_and_rate_are_rendered() {
        let s = Summary::new(&snap(&[("Black 2L", 6), ("Red 3L", 3)], 1, 0), 90_000);
        let text = s.to_string();
        assert!(text.starts_with("--- sorted after 00:01:30 ---"));
        assert!(text.contains("Black 2L  ####################  6"));
        assert!(text.contains("Red 3L    ##########..........  3"));
        assert!(text.contains("total sorted: 9 (6.0/min)"));
        assert!(text.contains("rescans+rejects: 1 (rescans 1, rejects 0)"));
        assert!(text.contains("indeterminate: 11.1%"));
    }

    #[rstest]
    #[case(3, 1, 0, 33.3)]
    #[case(0, 2, 1, 0.0)]
    #[case(2, 0, 1, 50.0)]
    #[case(2, 4, 1, 250.0)]
    fn indeterminate_rate(
        #[case] sorted: u64,
        #[case] rescans: u64,
        #[case] rejects: u64,
        #[case] pct: f64,
    ) {
        let s = Summary::new(&snap(&[("Tan 2L", sorted)], rescans, rejects), 1_000);
        assert!((s.indeterminate_pct - pct).abs() < 1e-9, "{}", s.indeterminate_pct);
    }

    #[test]
    fn json_has_every_field() {
        let s = Summary::new(&snap(&[("LBG 2L", 2)], 0, 1), 5_000);
        let v: serde_json::Value = serde_json::from_str(&s.to_json().unwrap()).unwrap();
        assert_eq!(v["total_sorted"], 2);
        assert_eq!(v["rejects"], 1);
        assert_eq!(v["profiles"][0]["name"], "LBG 2L");
        assert_eq!(v["uptime_ms"], 5_000);
    }
}
