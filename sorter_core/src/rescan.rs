//! Retry-or-reject decision for indeterminate objects.

use crate::config::{RescanCfg, ScanCfg};

/// What the scanning belt should do after an indeterminate result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Reverse by `distance` and scan the object again.
    Rescan { distance: i64 },
    /// Reverse further, past the feeder, giving up on the object.
    Reject { distance: i64 },
}

impl Recovery {
    pub fn distance(self) -> i64 {
        match self {
            Recovery::Rescan { distance } | Recovery::Reject { distance } => distance,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RescanPolicy {
    max_in_row: u8,
    rescan_distance: i64,
    reject_distance: i64,
    in_row: u8,
}

impl RescanPolicy {
    pub fn new(rescan: &RescanCfg, scan: &ScanCfg) -> Self {
        Self {
            max_in_row: rescan.max_in_row.max(1),
            rescan_distance: scan.rescan_distance,
            reject_distance: scan.reject_distance,
            in_row: 0,
        }
    }

    /// Indeterminate results since the last success or reject.
    pub fn in_row(&self) -> u8 {
        self.in_row
    }

    pub fn on_success(&mut self) {
        self.in_row = 0;
    }

    pub fn on_indeterminate(&mut self) -> Recovery {
        self.in_row = self.in_row.saturating_add(1);
        if self.in_row >= self.max_in_row {
            self.in_row = 0;
            Recovery::Reject {
                distance: self.reject_distance,
            }
        } else {
            Recovery::Rescan {
                distance: self.rescan_distance,
            }
        }
    }
}
