pub mod fifo_drop_oldest_queue;
pub mod latest1_queue;

pub use fifo_drop_oldest_queue::*;
pub use latest1_queue::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Only the newest event matters, e.g. what is on screen right now.
    Latest1,
    /// Notifications; the oldest is dropped when full.
    FifoDropOldest { capacity: usize },
}
