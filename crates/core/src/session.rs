//! Session state as an immutable value.
//!
//! Every user action and every analysis response is a [`SessionEvent`]; [`SessionState::apply`]
//! is the only place state changes, returning a new value plus what happened.

use std::{sync::Arc, time::SystemTime};

use serde::Serialize;

use crate::{
    analysis::{AnalysisResult, FrameAnalysis},
    config::ResponseOrdering,
    history::SessionHistory,
    types::{FrameDimensions, PoseFrame},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Streaming,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Checking,
    Connected,
    Unhealthy(String),
    Unreachable(String),
}

impl ConnectionStatus {
    pub fn describe(&self) -> String {
        match self {
            ConnectionStatus::Checking => "Checking connection...".to_string(),
            ConnectionStatus::Connected => "Connected to backend".to_string(),
            ConnectionStatus::Unhealthy(_) => "Backend connection error".to_string(),
            ConnectionStatus::Unreachable(url) => format!(
                "Cannot connect to backend. Make sure the analysis server is running at {}.",
                url
            ),
        }
    }
}

/// The accepted analysis currently driving the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentAnalysis {
    pub generation: u64,
    pub frame: PoseFrame,
    pub analysis: AnalysisResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    StartFailed(String),
    Paused,
    Resumed,
    Stopped,
    ConnectionChecked(ConnectionStatus),
    AnalysisReceived {
        generation: u64,
        result: FrameAnalysis,
        video: FrameDimensions,
        at: SystemTime,
    },
    Save {
        screenshot: String,
        at: SystemTime,
    },
    HistoryToggled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Submitted before the analysis already on screen.
    Stale,
    /// Arrived while paused or stopped.
    NotStreaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    PhaseChanged(Phase),
    AnalysisApplied { generation: u64 },
    AnalysisIgnored { generation: u64, reason: IgnoreReason },
    HistorySaved { id: u64 },
    SaveRejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: Phase,
    pub connection: ConnectionStatus,
    pub error: Option<String>,
    pub current: Option<Arc<CurrentAnalysis>>,
    pub last_applied_generation: u64,
    pub ordering: ResponseOrdering,
    pub history: Arc<SessionHistory>,
}

impl SessionState {
    pub fn new(ordering: ResponseOrdering, history_capacity: Option<usize>) -> Self {
        Self {
            phase: Phase::Idle,
            connection: ConnectionStatus::Checking,
            error: None,
            current: None,
            last_applied_generation: 0,
            ordering,
            history: Arc::new(SessionHistory::new(history_capacity)),
        }
    }

    pub fn current_analysis(&self) -> Option<&AnalysisResult> {
        self.current.as_deref().map(|c| &c.analysis)
    }

    pub fn is_live(&self) -> bool {
        self.phase == Phase::Streaming
    }

    pub fn apply(&self, event: SessionEvent) -> (SessionState, Effect) {
        let mut next = self.clone();
        let effect = match event {
            SessionEvent::Started => {
                if self.phase == Phase::Idle {
                    next.phase = Phase::Streaming;
                    next.error = None;
                    Effect::PhaseChanged(Phase::Streaming)
                } else {
                    Effect::None
                }
            }
            SessionEvent::StartFailed(message) => {
                next.phase = Phase::Idle;
                next.error = Some(message);
                Effect::PhaseChanged(Phase::Idle)
            }
            SessionEvent::Paused => {
                if self.phase == Phase::Streaming {
                    next.phase = Phase::Paused;
                    Effect::PhaseChanged(Phase::Paused)
                } else {
                    Effect::None
                }
            }
            SessionEvent::Resumed => {
                if self.phase == Phase::Paused {
                    next.phase = Phase::Streaming;
                    Effect::PhaseChanged(Phase::Streaming)
                } else {
                    Effect::None
                }
            }
            SessionEvent::Stopped => {
                if self.phase == Phase::Idle {
                    Effect::None
                } else {
                    next.phase = Phase::Idle;
                    Effect::PhaseChanged(Phase::Idle)
                }
            }
            SessionEvent::ConnectionChecked(status) => {
                next.connection = status;
                Effect::None
            }
            SessionEvent::AnalysisReceived {
                generation,
                result,
                video,
                at,
            } => {
                if self.phase != Phase::Streaming {
                    Effect::AnalysisIgnored {
                        generation,
                        reason: IgnoreReason::NotStreaming,
                    }
                } else if self.ordering == ResponseOrdering::Generation
                    && generation <= self.last_applied_generation
                {
                    Effect::AnalysisIgnored {
                        generation,
                        reason: IgnoreReason::Stale,
                    }
                } else {
                    next.last_applied_generation = generation;
                    next.current = Some(Arc::new(CurrentAnalysis {
                        generation,
                        frame: PoseFrame {
                            pose: result.pose,
                            video,
                            captured_at: at,
                        },
                        analysis: result.analysis,
                    }));
                    Effect::AnalysisApplied { generation }
                }
            }
            SessionEvent::Save { screenshot, at } => {
                if self.phase != Phase::Paused {
                    Effect::SaveRejected
                } else {
                    let history = Arc::make_mut(&mut next.history);
                    match history.save(self.current_analysis(), screenshot, at) {
                        Some(id) => Effect::HistorySaved { id },
                        None => Effect::SaveRejected,
                    }
                }
            }
            SessionEvent::HistoryToggled => {
                Arc::make_mut(&mut next.history).toggle_visible();
                Effect::None
            }
        };

        (next, effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point, Pose};

    fn received(generation: u64, x: f64) -> SessionEvent {
        let mut pose = Pose::default();
        pose.keypoints[0] = Some(Point::new(x, x));
        SessionEvent::AnalysisReceived {
            generation,
            result: FrameAnalysis {
                pose,
                analysis: AnalysisResult {
                    valid_pose: true,
                    score: 80.0,
                    metrics: Default::default(),
                    feedback: Vec::new(),
                },
            },
            video: FrameDimensions::new(640, 480),
            at: SystemTime::UNIX_EPOCH,
        }
    }

    fn streaming(ordering: ResponseOrdering) -> SessionState {
        SessionState::new(ordering, None).apply(SessionEvent::Started).0
    }

    fn nose_x(state: &SessionState) -> f64 {
        state.current.as_ref().unwrap().frame.pose.at(0).unwrap().x
    }

    #[test]
    fn test_lifecycle_transitions() {
        let idle = SessionState::new(ResponseOrdering::Generation, None);
        let (s, e) = idle.apply(SessionEvent::Paused);
        assert_eq!((s.phase, e), (Phase::Idle, Effect::None));

        let (s, _) = idle.apply(SessionEvent::Started);
        let (s, e) = s.apply(SessionEvent::Paused);
        assert_eq!((s.phase, e), (Phase::Paused, Effect::PhaseChanged(Phase::Paused)));
        let (s, _) = s.apply(SessionEvent::Resumed);
        assert_eq!(s.phase, Phase::Streaming);

        let (s, e) = s.apply(SessionEvent::Stopped);
        assert_eq!(e, Effect::PhaseChanged(Phase::Idle));
        let (_, e) = s.apply(SessionEvent::Stopped);
        assert_eq!(e, Effect::None);
    }

    #[test]
    fn test_failed_start_surfaces_error_and_retry_clears_it() {
        let idle = SessionState::new(ResponseOrdering::Generation, None);
        let (s, _) = idle.apply(SessionEvent::StartFailed("camera denied".into()));
        assert_eq!(s.error.as_deref(), Some("camera denied"));
        let (s, _) = s.apply(SessionEvent::Started);
        assert_eq!(s.error, None);
        assert!(s.is_live());
    }

    #[test]
    fn test_apply_does_not_mutate_previous_value() {
        let before = streaming(ResponseOrdering::Generation);
        let (after, _) = before.apply(received(1, 10.0));
        assert!(before.current.is_none());
        assert!(after.current.is_some());
    }

    #[test]
    fn test_generation_gate_drops_out_of_order_response() {
        let s = streaming(ResponseOrdering::Generation);
        let (s, _) = s.apply(received(2, 20.0));
        let (s, e) = s.apply(received(1, 10.0));

        assert_eq!(
            e,
            Effect::AnalysisIgnored {
                generation: 1,
                reason: IgnoreReason::Stale
            }
        );
        assert_eq!(nose_x(&s), 20.0);
    }

    #[test]
    fn test_arrival_order_regresses_to_stale_pose() {
        // Known gap of arrival-order application: a slow early response wins.
        let s = streaming(ResponseOrdering::Arrival);
        let (s, _) = s.apply(received(2, 20.0));
        let (s, e) = s.apply(received(1, 10.0));

        assert_eq!(e, Effect::AnalysisApplied { generation: 1 });
        assert_eq!(nose_x(&s), 10.0);
    }

    #[test]
    fn test_results_after_pause_or_stop_are_ignored() {
        let s = streaming(ResponseOrdering::Generation);
        let (paused, _) = s.apply(SessionEvent::Paused);
        let (_, e) = paused.apply(received(1, 10.0));
        assert_eq!(
            e,
            Effect::AnalysisIgnored {
                generation: 1,
                reason: IgnoreReason::NotStreaming
            }
        );

        let (stopped, _) = s.apply(SessionEvent::Stopped);
        let (after, _) = stopped.apply(received(1, 10.0));
        assert!(after.current.is_none());
    }

    #[test]
    fn test_save_requires_pause_and_analysis() {
        let s = streaming(ResponseOrdering::Generation);
        let save = || SessionEvent::Save {
            screenshot: "data:image/jpeg;base64,AA==".into(),
            at: SystemTime::now(),
        };

        let (paused, _) = s.apply(SessionEvent::Paused);
        let (after, e) = paused.apply(save());
        assert_eq!(e, Effect::SaveRejected);
        assert_eq!(after.history.len(), 0);

        let (s, _) = s.apply(received(1, 10.0));
        let (_, e) = s.apply(save());
        assert_eq!(e, Effect::SaveRejected);

        let (paused, _) = s.apply(SessionEvent::Paused);
        let (saved, e) = paused.apply(save());
        assert!(matches!(e, Effect::HistorySaved { .. }));
        assert_eq!(saved.history.len(), 1);
        assert_eq!(paused.history.len(), 0);
    }

    #[test]
    fn test_toggle_history_keeps_entries() {
        let s = streaming(ResponseOrdering::Generation);
        let (s, _) = s.apply(received(1, 10.0));
        let (s, _) = s.apply(SessionEvent::Paused);
        let (s, _) = s.apply(SessionEvent::Save {
            screenshot: "x".into(),
            at: SystemTime::now(),
        });
        let (toggled, _) = s.apply(SessionEvent::HistoryToggled);
        assert!(toggled.history.is_visible());
        assert_eq!(
            toggled.history.entries().collect::<Vec<_>>(),
            s.history.entries().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_connection_texts() {
        assert_eq!(ConnectionStatus::Connected.describe(), "Connected to backend");
        assert!(
            ConnectionStatus::Unreachable("http://localhost:5000".into())
                .describe()
                .contains("http://localhost:5000")
        );
    }
}
