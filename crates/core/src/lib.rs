pub mod analysis;
pub mod capture;
pub mod classify;
pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod events;
pub mod feedback;
pub mod format;
pub mod geometry;
pub mod history;
pub mod queues;
pub mod render;
pub mod routes;
pub mod scheduler;
pub mod session;
pub mod types;
pub mod workers;

pub use analysis::{AnalysisResult, FrameAnalysis, MetricValue};
pub use capture::{CaptureGuard, FrameSource, ImageSequenceSource};
pub use classify::{FormQuality, Judgement, classify_metric, classify_metrics, score_color};
pub use client::{AnalysisClient, PoseService};
pub use config::{FormCheckConfig, ResponseOrdering};
pub use error::{FormCheckError, Result};
pub use feedback::{Sentiment, classify_feedback, compose_feedback};
pub use format::{
    format_analysis_readable, format_analysis_summary, format_history_entry, format_timestamp,
};
pub use geometry::CoordinateMapper;
pub use history::{HistoryEntry, SessionHistory};
pub use scheduler::{FrameScheduler, FrameSink, NullSink, PaintedFrame, SchedulerHandle};
pub use session::{ConnectionStatus, Phase, SessionEvent, SessionState};
pub use types::{FrameDimensions, KeypointIndex, Point, Pose};
