use std::sync::Arc;

use anyhow::Result;
use formcheck_core::{
    FormCheckConfig, FrameScheduler, FrameSink, FrameSource, PoseService, SchedulerHandle,
    events::{BusConfig, EventBusBuilder},
    workers::Worker,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::debug;

use crate::workers::console_sink::ConsoleSinkWorker;

pub struct SessionRuntime {
    pub scheduler: SchedulerHandle,
    shutdown_tx: broadcast::Sender<()>,
    workers: Vec<JoinHandle<Result<()>>>,
}

impl SessionRuntime {
    /// Stop the scheduler, release the camera, then let the workers drain and exit.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        let _ = self.shutdown_tx.send(());
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

pub async fn start_session<S: FrameSource>(
    config: &FormCheckConfig,
    source: S,
    service: Arc<dyn PoseService>,
    sink: Box<dyn FrameSink>,
    json: bool,
) -> Result<SessionRuntime> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    let (bus, mut wiring) = EventBusBuilder::new(BusConfig::default())
        .subscribe(ConsoleSinkWorker::subscription())
        .build()?;
    debug!(session_id = %bus.session_id(), "event bus ready");

    let workers = vec![ConsoleSinkWorker::new(json).spawn(&mut wiring, &bus, shutdown_rx)?];

    let scheduler = match FrameScheduler::start(source, service, sink, config, bus).await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            let _ = shutdown_tx.send(());
            return Err(e.into());
        }
    };

    Ok(SessionRuntime {
        scheduler,
        shutdown_tx,
        workers,
    })
}
