use serde::Serialize;

use crate::{
    analysis::AnalysisResult,
    events::EventHeader,
    impl_event,
    session::{ConnectionStatus, Phase},
    types::Pose,
};

/// A response replaced the overlay.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisApplied {
    pub header: EventHeader,
    pub generation: u64,
    pub analysis: AnalysisResult,
    pub pose: Pose,
}

impl AnalysisApplied {
    pub const EVENT_TYPE: &'static str = "analysis.applied";

    pub fn new(generation: u64, analysis: AnalysisResult, pose: Pose) -> Self {
        Self {
            header: EventHeader::new(),
            generation,
            analysis,
            pose,
        }
    }
}

impl_event!(AnalysisApplied, AnalysisApplied::EVENT_TYPE);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Older than the analysis already applied.
    Stale,
    /// Arrived after pause or stop.
    NotStreaming,
    /// Failed shape or keypoint-count validation.
    Malformed,
    /// Transport failure, retried on the next submission.
    Transient,
    /// The backend answered with an error.
    Service,
}

/// A response, or a failed request, that left the overlay unchanged.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisRejected {
    pub header: EventHeader,
    pub generation: u64,
    pub reason: RejectReason,
    pub message: Option<String>,
}

impl AnalysisRejected {
    pub const EVENT_TYPE: &'static str = "analysis.rejected";

    pub fn new(generation: u64, reason: RejectReason, message: Option<String>) -> Self {
        Self {
            header: EventHeader::new(),
            generation,
            reason,
            message,
        }
    }
}

impl_event!(AnalysisRejected, AnalysisRejected::EVENT_TYPE);

#[derive(Clone, Debug, Serialize)]
pub struct SessionChanged {
    pub header: EventHeader,
    pub phase: Phase,
    pub connection: ConnectionStatus,
    pub error: Option<String>,
}

impl SessionChanged {
    pub const EVENT_TYPE: &'static str = "session.changed";

    pub fn new(phase: Phase, connection: ConnectionStatus, error: Option<String>) -> Self {
        Self {
            header: EventHeader::new(),
            phase,
            connection,
            error,
        }
    }
}

impl_event!(SessionChanged, SessionChanged::EVENT_TYPE);

#[derive(Clone, Debug, Serialize)]
pub struct HistorySaved {
    pub header: EventHeader,
    pub entry_id: u64,
    pub timestamp: String,
    pub score: f64,
    pub history_len: usize,
}

impl HistorySaved {
    pub const EVENT_TYPE: &'static str = "history.saved";
}

impl_event!(HistorySaved, HistorySaved::EVENT_TYPE);

/// A worker's handler returned an error for one of its inputs.
#[derive(Clone, Debug, Serialize)]
pub struct WorkerFailed {
    pub header: EventHeader,
    pub stage: &'static str,
    pub message: String,
}

impl WorkerFailed {
    pub const EVENT_TYPE: &'static str = "worker.failed";

    pub fn new(parent: uuid::Uuid, stage: &'static str, message: String) -> Self {
        Self {
            header: EventHeader::caused_by(parent),
            stage,
            message,
        }
    }
}

impl_event!(WorkerFailed, WorkerFailed::EVENT_TYPE);
