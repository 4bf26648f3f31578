//! Event Stream Hub (C8): publish-subscribe keyed by `project_id`, with
//! bounded per-subscriber queues, keepalive pings and idle garbage
//! collection.

pub mod hub;

pub use hub::{
    EventStatus, EventStreamHub, MaintenanceReport, StreamEvent, SubscriberHandle,
    DEFAULT_QUEUE_CAPACITY, IDLE_GC_TIMEOUT, KEEPALIVE_INTERVAL,
};
