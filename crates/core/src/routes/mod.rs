use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    events::EnrichedEvent,
    queues::{FifoDropOldestQueue, Latest1Queue},
};

pub struct Routes {
    pub table: HashMap<&'static str, Vec<Route>>,
}

pub struct Route {
    pub subscriber_id: &'static str,
    pub inbox: RouteInbox,
    /// Events overwritten before the subscriber read them.
    pub drops_total: Arc<AtomicU64>,
}

pub enum RouteInbox {
    Latest1(Arc<Latest1Queue<Arc<EnrichedEvent>>>),
    FifoDropOldest(Arc<FifoDropOldestQueue<Arc<EnrichedEvent>>>),
}

impl RouteInbox {
    /// Returns true when delivery pushed out an unread event.
    pub fn deliver(&self, event: Arc<EnrichedEvent>) -> bool {
        match self {
            RouteInbox::Latest1(q) => q.set(event),
            RouteInbox::FifoDropOldest(q) => q.push_overwrite(event),
        }
    }
}

impl Route {
    pub fn deliver(&self, event: Arc<EnrichedEvent>) {
        if self.inbox.deliver(event) {
            self.drops_total.fetch_add(1, Ordering::Relaxed);
        }
    }
}
