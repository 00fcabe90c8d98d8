use std::{future::Future, sync::Arc};

use anyhow::Result;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::warn;

use crate::{
    events::{EnrichedEvent, EventBus, WorkerFailed},
    workers::{SubscriptionSpec, WorkerBatch, WorkerInputs, WorkerWiring},
};

/// A bus subscriber with its own task. Handler errors are published as
/// [`WorkerFailed`] and never stop the loop.
pub trait Worker: Send + Sized + 'static {
    const SUBSCRIBER_ID: &'static str;

    fn subscription() -> SubscriptionSpec;

    fn handle(
        &mut self,
        event: Arc<EnrichedEvent>,
        bus: &EventBus,
    ) -> impl Future<Output = Result<()>> + Send;

    fn run(
        mut self,
        mut inputs: WorkerInputs,
        bus: EventBus,
        mut shutdown: broadcast::Receiver<()>,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            loop {
                let batch = tokio::select! {
                    _ = shutdown.recv() => return Ok(()),
                    batch = inputs.next() => batch,
                };

                let events: Vec<Arc<EnrichedEvent>> = match batch {
                    WorkerBatch::Snapshots(updates) => {
                        updates.into_iter().map(|u| u.event).collect()
                    }
                    WorkerBatch::FifoItem { event, .. } => vec![event],
                };

                for event in events {
                    let parent = event.event.event_id();
                    if let Err(e) = self.handle(event, &bus).await {
                        warn!(worker = Self::SUBSCRIBER_ID, error = %e, "handler failed");
                        bus.publish(Arc::new(WorkerFailed::new(
                            parent,
                            Self::SUBSCRIBER_ID,
                            format!("{e:#}"),
                        )));
                    }
                }
            }
        }
    }

    /// Claim this worker's inputs from `wiring` and run it on its own task.
    fn spawn(
        self,
        wiring: &mut WorkerWiring,
        bus: &EventBus,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<Result<()>>> {
        let inputs = wiring.take(Self::SUBSCRIBER_ID).ok_or_else(|| {
            anyhow::anyhow!("no inputs wired for subscriber_id={}", Self::SUBSCRIBER_ID)
        })?;
        Ok(tokio::spawn(self.run(inputs, bus.clone(), shutdown)))
    }
}
