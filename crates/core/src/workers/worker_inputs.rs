use std::sync::Arc;

use tokio::sync::Notify;

use crate::{
    events::EnrichedEvent,
    queues::{FifoDropOldestReceiver, Latest1Queue},
};

pub struct Latest1Input {
    pub event_type: &'static str,
    pub queue: Arc<Latest1Queue<Arc<EnrichedEvent>>>,
}

pub struct FifoInput {
    pub event_type: &'static str,
    pub receiver: FifoDropOldestReceiver<Arc<EnrichedEvent>>,
}

pub struct WorkerInputs {
    pub latest: Vec<Latest1Input>,
    pub fifos: Vec<FifoInput>,
    pub notify_any: Arc<Notify>,
    pub fifo_index: usize,
}

pub enum WorkerBatch {
    /// Newest value of every snapshot input that changed since the last read.
    Snapshots(Vec<SnapshotUpdate>),
    FifoItem {
        event_type: &'static str,
        event: Arc<EnrichedEvent>,
    },
}

pub struct SnapshotUpdate {
    pub event_type: &'static str,
    pub event: Arc<EnrichedEvent>,
}

impl WorkerInputs {
    /// Snapshots first, then one FIFO item per call, round-robin across inputs.
    pub async fn next(&mut self) -> WorkerBatch {
        loop {
            let snaps: Vec<_> = self
                .latest
                .iter()
                .filter_map(|l| {
                    l.queue.try_recv().map(|event| SnapshotUpdate {
                        event_type: l.event_type,
                        event,
                    })
                })
                .collect();

            if !snaps.is_empty() {
                return WorkerBatch::Snapshots(snaps);
            }

            for _ in 0..self.fifos.len() {
                let i = self.fifo_index;
                self.fifo_index = (self.fifo_index + 1) % self.fifos.len();
                let fifo = &self.fifos[i];

                if let Some(event) = fifo.receiver.try_recv() {
                    return WorkerBatch::FifoItem {
                        event_type: fifo.event_type,
                        event,
                    };
                }
            }

            self.notify_any.notified().await;
        }
    }
}
