//! Object profiles and the matcher.
//!
//! A profile accepts a fused object when both stage lengths lie strictly
//! inside their ranges and all six channel features lie inside their
//! (inclusive) ranges. The table is scanned in declared order and the
//! first accepting profile wins.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SorterError;
use crate::types::{Features, FusedObject, Outcome, ProfileId};

/// Exclusive length range: `low < len < high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthRange {
    pub low: i64,
    pub high: i64,
}

impl LengthRange {
    #[inline]
    pub fn admits(&self, len: i64) -> bool {
        self.low < len && len < self.high
    }
}

/// Inclusive channel range: `low <= v <= high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRange {
    pub low: f32,
    pub high: f32,
}

impl ChannelRange {
    #[inline]
    pub fn admits(&self, v: f32) -> bool {
        self.low <= v && v <= self.high
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProfile {
    pub name: String,
    /// Swing-arm position of this profile's bin.
    pub position: i64,
    /// Upstream, downstream.
    pub length: [LengthRange; 2],
    /// Upstream RGB, downstream RGB.
    pub colors: [[ChannelRange; 3]; 2],
}

impl ObjectProfile {
    pub fn matches(&self, lengths: [i64; 2], features: [Features; 2]) -> bool {
        self.length
            .iter()
            .zip(lengths)
            .all(|(r, len)| r.admits(len))
            && self
                .colors
                .iter()
                .zip(features)
                .all(|(ranges, f)| ranges.iter().zip(f.0).all(|(r, v)| r.admits(v)))
    }

    /// Build from the compact row form
    /// `[up_len lo, hi, down_len lo, hi, up R lo, hi, G lo, hi, B lo, hi, down R lo, hi, G lo, hi, B lo, hi]`.
    fn from_row(name: &str, position: i64, r: [i64; 16]) -> Self {
        let ch = |i: usize| ChannelRange {
            low: r[i] as f32,
            high: r[i + 1] as f32,
        };
        Self {
            name: name.to_owned(),
            position,
            length: [
                LengthRange {
                    low: r[0],
                    high: r[1],
                },
                LengthRange {
                    low: r[2],
                    high: r[3],
                },
            ],
            colors: [[ch(4), ch(6), ch(8)], [ch(10), ch(12), ch(14)]],
        }
    }
}

/// Built-in table for the pin sorter, in matching order.
const BUILTIN: [(&str, i64, [i64; 16]); 14] = [
    ("Black 2L", 2140, [91, 120, 50, 98, 1, 4, 1, 4, 0, 1, 0, 1, 0, 1, 0, 0]),
    ("Black 3L", 2260, [130, 157, 50, 143, 1, 4, 1, 4, 0, 1, 0, 1, 0, 1, 0, 0]),
    ("DBG 3L", 980, [112, 157, 30, 151, 5, 7, 5, 8, 0, 4, 1, 4, 2, 4, 1, 3]),
    ("DBG 1.5L", 880, [73, 100, 50, 89, 3, 8, 4, 7, 0, 4, 1, 4, 2, 4, 0, 3]),
    ("Blue 3L", 1920, [130, 159, 107, 143, 1, 6, 4, 11, 5, 16, 0, 2, 3, 5, 8, 18]),
    ("Blue 2L", 1820, [95, 116, 70, 100, 1, 6, 4, 11, 5, 16, 0, 2, 3, 5, 8, 24]),
    ("Blue 1.25L", 1700, [66, 90, 40, 76, 1, 6, 4, 11, 5, 16, 0, 2, 1, 5, 5, 24]),
    ("Tan 3L", 1600, [128, 171, 114, 159, 17, 24, 13, 20, 5, 10, 8, 16, 9, 14, 3, 11]),
    ("Tan 2L", 1500, [95, 115, 79, 106, 15, 28, 13, 25, 4, 10, 8, 16, 8, 15, 3, 12]),
    ("Tan 1.5L", 1400, [77, 89, 58, 79, 15, 28, 13, 25, 3, 10, 8, 16, 6, 15, 5, 12]),
    ("Red 3L", 2020, [116, 157, 110, 149, 11, 21, 3, 8, 0, 2, 6, 15, 1, 3, 0, 2]),
    ("LBG 1.25L", 1100, [66, 90, 45, 74, 9, 14, 9, 16, 4, 11, 2, 8, 1, 9, 4, 11]),
    ("LBG 2L", 1200, [95, 120, 80, 105, 9, 14, 9, 16, 4, 11, 5, 9, 5, 10, 3, 12]),
    ("LBG 3L", 1300, [130, 159, 112, 152, 9, 14, 9, 16, 4, 11, 3, 10, 3, 11, 2, 17]),
];

/// Ordered, immutable profile list.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    profiles: Vec<ObjectProfile>,
}

impl ProfileTable {
    pub fn new(profiles: Vec<ObjectProfile>) -> Self {
        Self { profiles }
    }

    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|(name, pos, row)| ObjectProfile::from_row(name, *pos, *row))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, id: ProfileId) -> Option<&ObjectProfile> {
        self.profiles.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProfileId, &ObjectProfile)> {
        self.profiles
            .iter()
            .enumerate()
            .map(|(i, p)| (ProfileId(i), p))
    }

    /// First profile accepting the raw measurements.
    pub fn classify_parts(&self, lengths: [i64; 2], features: [Features; 2]) -> Outcome {
        self.iter()
            .find(|(_, p)| p.matches(lengths, features))
            .map_or(Outcome::Indeterminate, |(id, _)| Outcome::Matched(id))
    }

    /// First profile accepting the fused object. Over-length objects never
    /// match because no range admits the sentinel length.
    pub fn classify(&self, obj: &FusedObject) -> Outcome {
        self.classify_parts(
            obj.lengths(),
            [obj.upstream.features, obj.downstream.features],
        )
    }
}

impl TryFrom<&[sorter_config::ProfileEntry]> for ProfileTable {
    type Error = SorterError;

    fn try_from(entries: &[sorter_config::ProfileEntry]) -> Result<Self, Self::Error> {
        if entries.is_empty() {
            return Err(SorterError::Config("profile table is empty".into()));
        }
        let profiles = entries
            .iter()
            .map(|e| {
                let ch = |r: [f32; 2]| ChannelRange {
                    low: r[0],
                    high: r[1],
                };
                ObjectProfile {
                    name: e.name.clone(),
                    position: e.position,
                    length: e.length.map(|[low, high]| LengthRange { low, high }),
                    colors: [e.upstream.map(ch), e.downstream.map(ch)],
                }
            })
            .collect();
        Ok(Self::new(profiles))
    }
}

/// Per-profile sorted counts plus rescan/reject totals.
#[derive(Debug)]
pub struct ProfileCounters {
    sorted: Vec<AtomicU64>,
    rescans: AtomicU64,
    rejects: AtomicU64,
}

/// Point-in-time copy of the counters, with profile names attached.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountsSnapshot {
    pub sorted: Vec<(String, u64)>,
    pub rescans: u64,
    pub rejects: u64,
}

impl CountsSnapshot {
    pub fn total_sorted(&self) -> u64 {
        self.sorted.iter().map(|(_, n)| n).sum()
    }

    /// Rescans plus rejects: every indeterminate result.
    pub fn indeterminate(&self) -> u64 {
        self.rescans + self.rejects
    }
}

impl ProfileCounters {
    pub fn new(profiles: usize) -> Self {
        Self {
            sorted: (0..profiles).map(|_| AtomicU64::new(0)).collect(),
            rescans: AtomicU64::new(0),
            rejects: AtomicU64::new(0),
        }
    }

    pub fn record(&self, id: ProfileId) {
        if let Some(c) = self.sorted.get(id.0) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rescan(&self) {
        self.rescans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reject(&self) {
        self.rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, id: ProfileId) -> u64 {
        self.sorted
            .get(id.0)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn rescans(&self) -> u64 {
        self.rescans.load(Ordering::Relaxed)
    }

    pub fn rejects(&self) -> u64 {
        self.rejects.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, table: &ProfileTable) -> CountsSnapshot {
        CountsSnapshot {
            sorted: table
                .iter()
                .map(|(id, p)| (p.name.clone(), self.count(id)))
                .collect(),
            rescans: self.rescans(),
            rejects: self.rejects(),
        }
    }
}
