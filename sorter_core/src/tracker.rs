//! Cross-stage object tracking.
//!
//! The downstream stage owns the tracker. Upstream records arrive in
//! order and queue as pending; each downstream record is fused with the
//! oldest pending one. A rescan truncates the fused sequence at the failed
//! index, drops every pending record and bumps the generation so late
//! records from before the reversal are discarded on arrival.
//!
//! Indices keep counting for the whole run, but only the most recent
//! [`HISTORY`] fused objects are retained.

use std::collections::VecDeque;

use tracing::debug;

use crate::types::{FusedObject, Outcome, StageRecord};

/// Fused objects kept for inspection once they are finished.
pub const HISTORY: usize = 32;

#[derive(Debug, Default)]
pub struct Tracker {
    pending: VecDeque<StageRecord>,
    fused: VecDeque<FusedObject>,
    /// Index of `fused[0]`.
    base: usize,
    generation: u64,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue an upstream record. Returns false when it is stale.
    pub fn accept(&mut self, record: StageRecord) -> bool {
        if record.generation != self.generation {
            debug!(
                record_gen = record.generation,
                current_gen = self.generation,
                start = record.start,
                "dropping stale upstream record"
            );
            return false;
        }
        self.pending.push_back(record);
        true
    }

    /// Upstream record the next downstream object will be fused with.
    pub fn next_pending(&self) -> Option<&StageRecord> {
        self.pending.front()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Fuse `downstream` with the oldest pending upstream record and
    /// append the result. Returns its index.
    pub fn fuse(&mut self, downstream: StageRecord) -> Option<usize> {
        let upstream = self.pending.pop_front()?;
        while self.fused.len() >= HISTORY {
            self.fused.pop_front();
            self.base += 1;
        }
        let index = self.next_index();
        let offset = downstream.start - upstream.start;
        debug!(
            index,
            up_len = upstream.length,
            down_len = downstream.length,
            offset,
            "objects fused"
        );
        self.fused.push_back(FusedObject {
            index,
            upstream,
            downstream,
            offset,
            outcome: None,
            arrival_ms: None,
            dispatch_at_ms: None,
        });
        Some(index)
    }

    pub fn set_outcome(&mut self, index: usize, outcome: Outcome) {
        if let Some(obj) = self.slot_mut(index) {
            obj.outcome = Some(outcome);
        }
    }

    pub fn set_dispatch(&mut self, index: usize, arrival_ms: u64, dispatch_at_ms: u64) {
        if let Some(obj) = self.slot_mut(index) {
            obj.arrival_ms = Some(arrival_ms);
            obj.dispatch_at_ms = Some(dispatch_at_ms);
        }
    }

    /// Discard the entry at `index` and after, every pending record, and
    /// start a new generation. Returns the new generation.
    pub fn truncate_at(&mut self, index: usize) -> u64 {
        if index >= self.base {
            self.fused.truncate(index - self.base);
        } else {
            self.fused.clear();
            self.base = index;
        }
        let dropped = self.pending.len();
        self.pending.clear();
        self.generation += 1;
        debug!(index, dropped, generation = self.generation, "tracker truncated");
        self.generation
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut FusedObject> {
        let at = index.checked_sub(self.base)?;
        self.fused.get_mut(at)
    }

    /// Fused object `index`, while it is still retained.
    pub fn get(&self, index: usize) -> Option<&FusedObject> {
        self.fused.get(index.checked_sub(self.base)?)
    }

    /// Index the next fused object will get.
    pub fn next_index(&self) -> usize {
        self.base + self.fused.len()
    }

    /// Number of retained fused objects.
    pub fn len(&self) -> usize {
        self.fused.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fused.is_empty()
    }
}
