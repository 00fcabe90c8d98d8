//! The capture-and-analyze loop.
//!
//! One task owns the capture device, both canvases and the session state. It ticks once
//! per render interval, paints every tick and submits a frame whenever the submission gate
//! opens. Requests run on their own tasks and report back over a channel, so a slow
//! backend never delays a paint.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime},
};

use image::RgbaImage;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    analysis::FrameAnalysis,
    capture::{CaptureGuard, FrameSource},
    client::PoseService,
    config::FormCheckConfig,
    encode::encode_jpeg_data_url,
    error::{FormCheckError, Result},
    events::{
        AnalysisApplied, AnalysisRejected, EventBus, EventHeader, HistorySaved, RejectReason,
        SessionChanged,
    },
    geometry::CoordinateMapper,
    render::{DrawSurface, RasterCanvas, RenderStats, Scene, SkeletonRenderer},
    session::{ConnectionStatus, Effect, IgnoreReason, SessionEvent, SessionState},
    types::FrameDimensions,
};

/// Opens once strictly more than `interval` has passed since the last submission.
#[derive(Debug, Clone)]
pub struct SubmissionGate {
    interval: Duration,
    last: Option<Instant>,
}

impl SubmissionGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true and records `now` as the last submission when the gate is open.
    pub fn try_open(&mut self, now: Instant) -> bool {
        let open = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        };
        if open {
            self.last = Some(now);
        }
        open
    }
}

/// What the loop painted on one tick.
pub struct PaintedFrame<'a> {
    pub tick: u64,
    pub overlay: &'a RasterCanvas,
    pub skeleton: &'a RasterCanvas,
    pub overlay_stats: RenderStats,
    /// Generation of the analysis drawn, if any.
    pub generation: Option<u64>,
}

/// Receives every painted frame, on the scheduler task.
pub trait FrameSink: Send + 'static {
    fn present(&mut self, frame: &PaintedFrame<'_>);
}

impl FrameSink for Box<dyn FrameSink> {
    fn present(&mut self, frame: &PaintedFrame<'_>) {
        (**self).present(frame);
    }
}

/// Discards frames, for front ends that only watch the session state.
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &PaintedFrame<'_>) {}
}

enum Command {
    Pause,
    Resume,
    ToggleHistory,
    Connection(ConnectionStatus),
    Save(oneshot::Sender<Option<u64>>),
    Stop,
}

struct Completion {
    generation: u64,
    video: FrameDimensions,
    result: Result<FrameAnalysis>,
}

/// Shared between the handle and the loop. Painting happens under `paint_lock` and only
/// while `live` is set, so once `stop` returns nothing else reaches the sink.
struct Liveness {
    live: AtomicBool,
    paint_lock: Mutex<()>,
}

pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    liveness: Arc<Liveness>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn is_live(&self) -> bool {
        self.liveness.live.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        let _ = self.commands.send(Command::Pause);
    }

    pub fn resume(&self) {
        let _ = self.commands.send(Command::Resume);
    }

    pub fn toggle_history(&self) {
        let _ = self.commands.send(Command::ToggleHistory);
    }

    pub fn set_connection(&self, status: ConnectionStatus) {
        let _ = self.commands.send(Command::Connection(status));
    }

    /// Snapshot the overlay into history. `None` unless paused on a valid analysis.
    pub async fn save(&self) -> Option<u64> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Save(reply)).ok()?;
        rx.await.ok().flatten()
    }

    /// Synchronous and idempotent. No paint happens after this returns, even for
    /// requests still in flight.
    pub fn stop(&self) {
        if self.liveness.live.swap(false, Ordering::SeqCst) {
            info!("scheduler stopping");
        }
        let _ = self.commands.send(Command::Stop);
        drop(
            self.liveness
                .paint_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    /// Stop and wait for the capture device to be released.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct FrameScheduler;

impl FrameScheduler {
    /// Acquire the capture device and start the loop. A device failure is returned and
    /// published as a failed start; nothing is left running.
    pub async fn start<S, K>(
        source: S,
        service: Arc<dyn PoseService>,
        sink: K,
        config: &FormCheckConfig,
        bus: EventBus,
    ) -> Result<SchedulerHandle>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let state = SessionState::new(config.response_ordering, config.history_capacity);

        let capture = match CaptureGuard::open(source).await {
            Ok(capture) => capture,
            Err(e) => {
                let (failed, _) = state.apply(SessionEvent::StartFailed(e.to_string()));
                publish_session(&bus, &failed);
                return Err(e);
            }
        };

        let (state, _) = state.apply(SessionEvent::Started);
        publish_session(&bus, &state);

        let (state_tx, state_rx) = watch::channel(state.clone());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let liveness = Arc::new(Liveness {
            live: AtomicBool::new(true),
            paint_lock: Mutex::new(()),
        });

        let default_video = config.default_video_dimensions();
        let video = capture.dimensions().or(default_video);

        let runner = Runner {
            capture,
            service,
            sink,
            bus,
            state,
            state_tx,
            liveness: Arc::clone(&liveness),
            gate: SubmissionGate::new(config.analyze_interval()),
            render_interval: config.render_interval(),
            jpeg_quality: config.jpeg_quality,
            snapshot_quality: config.snapshot_quality,
            default_video,
            next_generation: 0,
            tick: 0,
            overlay: RasterCanvas::new(video),
            skeleton: RasterCanvas::new(config.skeleton_view_dimensions()),
            overlay_renderer: SkeletonRenderer::overlay().with_color_mode(config.color_mode),
            skeleton_renderer: SkeletonRenderer::skeleton_view().with_color_mode(config.color_mode),
            completions_tx,
        };

        let task = tokio::spawn(runner.run(commands_rx, completions_rx));

        Ok(SchedulerHandle {
            commands: commands_tx,
            state: state_rx,
            liveness,
            task: Some(task),
        })
    }
}

fn publish_session(bus: &EventBus, state: &SessionState) {
    bus.publish(Arc::new(SessionChanged::new(
        state.phase,
        state.connection.clone(),
        state.error.clone(),
    )));
}

struct Runner<S: FrameSource, K: FrameSink> {
    capture: CaptureGuard<S>,
    service: Arc<dyn PoseService>,
    sink: K,
    bus: EventBus,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    liveness: Arc<Liveness>,
    gate: SubmissionGate,
    render_interval: Duration,
    jpeg_quality: u8,
    snapshot_quality: u8,
    /// Mapping source for analyses whose frame size was unknown.
    default_video: FrameDimensions,
    next_generation: u64,
    tick: u64,
    overlay: RasterCanvas,
    skeleton: RasterCanvas,
    overlay_renderer: SkeletonRenderer,
    skeleton_renderer: SkeletonRenderer,
    completions_tx: mpsc::UnboundedSender<Completion>,
}

impl<S: FrameSource, K: FrameSink> Runner<S, K> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        let mut ticker = tokio::time::interval(self.render_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let streaming = self.state.is_live();
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    None | Some(Command::Stop) => break,
                    Some(command) => self.on_command(command),
                },
                Some(completion) = completions.recv() => self.on_completion(completion),
                _ = ticker.tick(), if streaming => self.on_tick().await,
            }
        }

        self.liveness.live.store(false, Ordering::SeqCst);
        self.capture.release();
        self.transition(SessionEvent::Stopped);
        info!(ticks = self.tick, submitted = self.next_generation, "scheduler stopped");
    }

    fn transition(&mut self, event: SessionEvent) -> Effect {
        let (next, effect) = self.state.apply(event);
        if matches!(effect, Effect::PhaseChanged(_)) || next.connection != self.state.connection
        {
            publish_session(&self.bus, &next);
        }
        self.state = next;
        self.state_tx.send_replace(self.state.clone());
        effect
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Pause => {
                if self.transition(SessionEvent::Paused) != Effect::None {
                    self.capture.pause();
                }
            }
            Command::Resume => {
                if self.transition(SessionEvent::Resumed) != Effect::None {
                    self.capture.resume();
                }
            }
            Command::ToggleHistory => {
                self.transition(SessionEvent::HistoryToggled);
            }
            Command::Connection(status) => {
                self.transition(SessionEvent::ConnectionChecked(status));
            }
            Command::Save(reply) => {
                let _ = reply.send(self.save());
            }
            Command::Stop => {}
        }
    }

    fn save(&mut self) -> Option<u64> {
        let screenshot = match self.overlay.to_jpeg_data_url(self.snapshot_quality) {
            Ok(screenshot) => screenshot,
            Err(e) => {
                warn!(error = %e, "snapshot encoding failed");
                return None;
            }
        };

        match self.transition(SessionEvent::Save {
            screenshot,
            at: SystemTime::now(),
        }) {
            Effect::HistorySaved { id } => {
                let entry = self.state.history.latest()?;
                self.bus.publish(Arc::new(HistorySaved {
                    header: EventHeader::new(),
                    entry_id: id,
                    timestamp: entry.timestamp.clone(),
                    score: entry.analysis.score,
                    history_len: self.state.history.len(),
                }));
                info!(id, "analysis saved to history");
                Some(id)
            }
            _ => {
                debug!("save ignored: not paused on a valid analysis");
                None
            }
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        let Completion {
            generation,
            video,
            result,
        } = completion;

        if !self.liveness.live.load(Ordering::SeqCst) {
            return;
        }

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                let reason = match &e {
                    FormCheckError::MalformedResult { .. } => RejectReason::Malformed,
                    FormCheckError::Service { .. } => RejectReason::Service,
                    _ => RejectReason::Transient,
                };
                if e.is_transient() {
                    warn!(generation, error = %e, "analysis failed");
                } else {
                    debug!(generation, error = %e, "analysis discarded");
                }
                self.reject(generation, reason, Some(e.to_string()));
                return;
            }
        };

        let effect = self.transition(SessionEvent::AnalysisReceived {
            generation,
            result: result.clone(),
            video,
            at: SystemTime::now(),
        });

        match effect {
            Effect::AnalysisApplied { generation } => {
                self.bus.publish(Arc::new(AnalysisApplied::new(
                    generation,
                    result.analysis,
                    result.pose,
                )));
            }
            Effect::AnalysisIgnored { generation, reason } => {
                let reason = match reason {
                    IgnoreReason::Stale => RejectReason::Stale,
                    IgnoreReason::NotStreaming => RejectReason::NotStreaming,
                };
                debug!(generation, ?reason, "analysis ignored");
                self.reject(generation, reason, None);
            }
            _ => {}
        }
    }

    fn reject(&self, generation: u64, reason: RejectReason, message: Option<String>) {
        self.bus
            .publish(Arc::new(AnalysisRejected::new(generation, reason, message)));
    }

    async fn on_tick(&mut self) {
        if !self.liveness.live.load(Ordering::SeqCst) {
            return;
        }
        self.tick += 1;

        let frame = match self.capture.grab().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "frame not available");
                return;
            }
        };

        let video = FrameDimensions::new(frame.width(), frame.height());
        if self.gate.try_open(Instant::now()) {
            self.submit(Arc::clone(&frame), video);
        }

        self.paint(&frame, video);
    }

    /// Fire and forget: the outcome comes back through `completions`.
    fn submit(&mut self, frame: Arc<RgbaImage>, video: FrameDimensions) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let quality = self.jpeg_quality;
        let service = Arc::clone(&self.service);
        let completions = self.completions_tx.clone();

        debug!(generation, "submitting frame");
        tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(move || {
                encode_jpeg_data_url(&frame, quality)
            })
            .await
            {
                Ok(Ok(image)) => service.analyze_frame(image).await,
                Ok(Err(e)) => Err(e),
                Err(e) => Err(FormCheckError::Service {
                    message: format!("encoder task failed: {e}"),
                }),
            };
            let _ = completions.send(Completion {
                generation,
                video,
                result,
            });
        });
    }

    fn paint(&mut self, frame: &RgbaImage, video: FrameDimensions) {
        let _guard = self
            .liveness
            .paint_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.liveness.live.load(Ordering::SeqCst) {
            return;
        }

        self.overlay.resize(video);

        let current = self.state.current.as_deref();
        let source = current.map(|c| c.frame.video).unwrap_or(video);
        let to_overlay =
            CoordinateMapper::with_fallback(source, self.overlay.dimensions(), self.default_video);
        let to_skeleton =
            CoordinateMapper::with_fallback(source, self.skeleton.dimensions(), self.default_video);
        let overlay_pose = current.map(|c| to_overlay.map_pose(&c.frame.pose));
        let skeleton_pose = current.map(|c| to_skeleton.map_pose(&c.frame.pose));
        let analysis = current.map(|c| &c.analysis);

        let overlay_stats = self.overlay_renderer.render(
            &mut self.overlay,
            Scene {
                backdrop: Some(frame),
                pose: overlay_pose.as_ref(),
                analysis,
            },
        );
        self.skeleton_renderer.render(
            &mut self.skeleton,
            Scene {
                backdrop: None,
                pose: skeleton_pose.as_ref(),
                analysis,
            },
        );

        self.sink.present(&PaintedFrame {
            tick: self.tick,
            overlay: &self.overlay,
            skeleton: &self.skeleton,
            overlay_stats,
            generation: current.map(|c| c.generation),
        });
    }
}
