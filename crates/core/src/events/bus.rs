use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::time::Instant;
use tracing::{error, trace};
use uuid::Uuid;

use crate::{
    events::{BusConfig, BusMetrics, EnrichedEvent, Event},
    routes::Routes,
};

/// Fan-out of session events to UI subscribers. Publishing never blocks.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

struct EventBusInner {
    session_id: Uuid,
    next_ingest_seq: AtomicU64,
    routes: Routes,
    metrics: Arc<BusMetrics>,
    strict_routing: bool,
}

impl EventBus {
    pub fn new(cfg: BusConfig, routes: Routes, metrics: Arc<BusMetrics>) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                session_id: cfg.session_id,
                next_ingest_seq: AtomicU64::new(0),
                routes,
                metrics,
                strict_routing: cfg.strict_routing,
            }),
        }
    }

    /// A bus with no subscribers; everything published is counted as unrouted.
    pub fn detached() -> Self {
        Self::new(
            BusConfig::default(),
            Routes {
                table: Default::default(),
            },
            Arc::new(BusMetrics::new()),
        )
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: Arc<dyn Event>) -> usize {
        let ingest_seq = self.inner.next_ingest_seq.fetch_add(1, Ordering::Relaxed);
        let event_type = event.event_type();

        let Some(routes) = self.inner.routes.table.get(event_type) else {
            self.inner.metrics.record_unrouted(event_type);
            if self.inner.strict_routing {
                error!(event_type, "unrouted event");
            }
            return 0;
        };

        let enriched = Arc::new(EnrichedEvent {
            event,
            session_id: self.inner.session_id,
            ingest_seq,
            ingested_at: Instant::now(),
        });

        for route in routes {
            trace!(event_type, subscriber = route.subscriber_id, "deliver");
            route.deliver(Arc::clone(&enriched));
        }
        routes.len()
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.inner.metrics
    }

    /// Overwritten-before-read count for one subscriber and event type.
    pub fn drops(&self, subscriber_id: &str, event_type: &str) -> u64 {
        self.inner
            .routes
            .table
            .get(event_type)
            .into_iter()
            .flatten()
            .filter(|r| r.subscriber_id == subscriber_id)
            .map(|r| r.drops_total.load(Ordering::Relaxed))
            .sum()
    }
}
