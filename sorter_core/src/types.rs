//! Records passed between the pipeline stages.

/// Length given to an object whose exit was never seen within the
/// configured maximum; no profile range can contain it.
pub const OVER_LENGTH: i64 = i64::MAX;

/// Which sensor produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// First sensor, white background.
    Upstream,
    /// Second sensor, black background.
    Downstream,
}

impl Stage {
    pub const fn index(self) -> usize {
        match self {
            Stage::Upstream => 0,
            Stage::Downstream => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Stage::Upstream => "upstream",
            Stage::Downstream => "downstream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Enter,
    Exit { over_length: bool },
}

/// Object boundary seen by one stage, at a scanning-belt position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionEvent {
    pub stage: Stage,
    pub position: i64,
    pub kind: EventKind,
}

/// Per-channel feature vector (red, green, blue).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Features(pub [f32; 3]);

/// One stage's view of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    /// Rescan generation the record was produced in.
    pub generation: u64,
    pub start: i64,
    /// `exit - start`, or [`OVER_LENGTH`].
    pub length: i64,
    pub features: Features,
}

impl StageRecord {
    pub fn is_over_length(&self) -> bool {
        self.length == OVER_LENGTH
    }
}

/// Index into the profile table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileId(pub usize);

/// Result of matching one fused object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Matched(ProfileId),
    Indeterminate,
}

/// Both stage records of one physical object.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedObject {
    pub index: usize,
    pub upstream: StageRecord,
    pub downstream: StageRecord,
    /// Downstream start minus upstream start.
    pub offset: i64,
    pub outcome: Option<Outcome>,
    pub arrival_ms: Option<u64>,
    pub dispatch_at_ms: Option<u64>,
}

impl FusedObject {
    pub fn lengths(&self) -> [i64; 2] {
        [self.upstream.length, self.downstream.length]
    }
}
