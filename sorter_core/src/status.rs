//! Result of one downstream iteration.

use crate::types::ProfileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Classified and handed to the arm.
    Sorted {
        index: usize,
        profile: ProfileId,
        due_ms: u64,
    },
    /// Indeterminate; the belt was reversed for another look.
    Rescanned { index: usize },
    /// Indeterminate too many times in a row; sent back to the hopper.
    Rejected { index: usize },
    /// Nothing processed (shutdown, or the upstream stage is gone).
    Idle,
}
