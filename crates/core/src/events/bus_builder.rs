use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
    events::EventBus,
    queues::{FifoDropOldestQueue, Latest1Queue, QueueKind},
    routes::{Route, RouteInbox, Routes},
    workers::{FifoInput, Latest1Input, SubscriptionSpec, WorkerInputs, WorkerWiring},
};

pub struct BusConfig {
    pub session_id: Uuid,
    /// Log unrouted publishes as errors instead of counting them silently.
    pub strict_routing: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            strict_routing: false,
        }
    }
}

pub struct BusMetrics {
    pub unrouted_publish_total: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self {
            unrouted_publish_total: AtomicU64::new(0),
        }
    }

    pub fn record_unrouted(&self, _event_type: &'static str) {
        self.unrouted_publish_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unrouted(&self) -> u64 {
        self.unrouted_publish_total.load(Ordering::Relaxed)
    }
}

impl Default for BusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(subs: &[SubscriptionSpec]) -> Result<()> {
    let mut seen_subscribers: HashSet<&'static str> = HashSet::new();
    for s in subs {
        if s.subscriber_id.trim().is_empty() {
            anyhow::bail!("empty subscriber_id");
        }
        if !seen_subscribers.insert(s.subscriber_id) {
            anyhow::bail!("duplicate subscriber_id={}", s.subscriber_id);
        }
        if s.inputs.is_empty() {
            anyhow::bail!("subscriber_id={} has no inputs", s.subscriber_id);
        }

        let mut seen_inputs: HashSet<&'static str> = HashSet::new();
        for i in &s.inputs {
            if i.event_type.trim().is_empty() {
                anyhow::bail!("subscriber_id={} has empty event_type", s.subscriber_id);
            }
            if !seen_inputs.insert(i.event_type) {
                anyhow::bail!(
                    "subscriber_id={} has duplicate input event_type={}",
                    s.subscriber_id,
                    i.event_type
                );
            }
            if let QueueKind::FifoDropOldest { capacity } = i.queue_kind {
                anyhow::ensure!(
                    capacity > 0,
                    "subscriber_id={} event_type={}: capacity must be > 0",
                    s.subscriber_id,
                    i.event_type
                );
            }
        }
    }
    Ok(())
}

pub struct EventBusBuilder {
    cfg: BusConfig,
    subs: Vec<SubscriptionSpec>,
}

impl EventBusBuilder {
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            subs: Vec::new(),
        }
    }

    pub fn subscribe(mut self, s: SubscriptionSpec) -> Self {
        self.subs.push(s);
        self
    }

    pub fn build(self) -> Result<(EventBus, WorkerWiring)> {
        validate(&self.subs)?;

        let mut routes: HashMap<&'static str, Vec<Route>> = HashMap::new();
        let mut wiring: HashMap<&'static str, WorkerInputs> = HashMap::new();
        let metrics = Arc::new(BusMetrics::new());

        for spec in self.subs {
            let notify_any = Arc::new(Notify::new());
            let mut latest = Vec::new();
            let mut fifos = Vec::new();

            for input in spec.inputs {
                let drops_total = Arc::new(AtomicU64::new(0));

                let inbox = match input.queue_kind {
                    QueueKind::Latest1 => {
                        let q = Arc::new(Latest1Queue::new(Arc::clone(&notify_any)));
                        latest.push(Latest1Input {
                            event_type: input.event_type,
                            queue: Arc::clone(&q),
                        });
                        RouteInbox::Latest1(q)
                    }
                    QueueKind::FifoDropOldest { capacity } => {
                        let q =
                            Arc::new(FifoDropOldestQueue::new(capacity, Arc::clone(&notify_any)));
                        fifos.push(FifoInput {
                            event_type: input.event_type,
                            receiver: q.receiver(),
                        });
                        RouteInbox::FifoDropOldest(q)
                    }
                };

                routes.entry(input.event_type).or_default().push(Route {
                    subscriber_id: spec.subscriber_id,
                    inbox,
                    drops_total,
                });
            }

            wiring.insert(
                spec.subscriber_id,
                WorkerInputs {
                    latest,
                    fifos,
                    notify_any,
                    fifo_index: 0,
                },
            );
        }

        let bus = EventBus::new(self.cfg, Routes { table: routes }, metrics);
        Ok((bus, WorkerWiring::new(wiring)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{SessionChanged, downcast_ref},
        session::{ConnectionStatus, Phase},
        workers::{InputSpec, WorkerBatch},
    };

    fn spec(id: &'static str, inputs: Vec<InputSpec>) -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: id,
            inputs,
        }
    }

    fn input(event_type: &'static str, queue_kind: QueueKind) -> InputSpec {
        InputSpec {
            event_type,
            queue_kind,
        }
    }

    fn changed(phase: Phase) -> Arc<SessionChanged> {
        Arc::new(SessionChanged::new(phase, ConnectionStatus::Connected, None))
    }

    #[test]
    fn test_rejects_bad_subscriptions() {
        let dup = EventBusBuilder::new(BusConfig::default())
            .subscribe(spec("ui", vec![input("a", QueueKind::Latest1)]))
            .subscribe(spec("ui", vec![input("b", QueueKind::Latest1)]))
            .build();
        assert!(dup.is_err());

        let empty = EventBusBuilder::new(BusConfig::default())
            .subscribe(spec("ui", vec![]))
            .build();
        assert!(empty.is_err());

        let zero = EventBusBuilder::new(BusConfig::default())
            .subscribe(spec(
                "ui",
                vec![input("a", QueueKind::FifoDropOldest { capacity: 0 })],
            ))
            .build();
        assert!(zero.is_err());
    }

    #[tokio::test]
    async fn test_routes_by_type_and_counts_unrouted() {
        let (bus, mut wiring) = EventBusBuilder::new(BusConfig::default())
            .subscribe(spec(
                "ui",
                vec![input(
                    SessionChanged::EVENT_TYPE,
                    QueueKind::FifoDropOldest { capacity: 1 },
                )],
            ))
            .build()
            .unwrap();

        assert_eq!(bus.publish(changed(Phase::Streaming)), 1);
        assert_eq!(bus.publish(changed(Phase::Paused)), 1);
        assert_eq!(bus.drops("ui", SessionChanged::EVENT_TYPE), 1);

        let mut inputs = wiring.take("ui").unwrap();
        match inputs.next().await {
            WorkerBatch::FifoItem { event, .. } => {
                let e = downcast_ref::<SessionChanged>(&event.event).unwrap();
                assert_eq!(e.phase, Phase::Paused);
            }
            WorkerBatch::Snapshots(_) => panic!("expected fifo item"),
        }

        let detached = EventBus::detached();
        assert_eq!(detached.publish(changed(Phase::Idle)), 0);
        assert_eq!(detached.metrics().unrouted(), 1);
    }
}
