//! C8 — Event Stream Hub.
//!
//! Publish-subscribe keyed by `project_id`. Grounded on the original
//! `TaskRouter`'s `Arc<Registry>` + async-lock style, retargeted from
//! agent-task routing to fan-out event delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use tc_governance::ProjectId;

/// Bounded capacity of each subscriber's queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;
/// Synthesize a `ping` if nothing has been delivered within this window.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);
/// A project with zero subscribers is garbage-collected after this long.
pub const IDLE_GC_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Connected,
    InProgress,
    Ping,
    Complete,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub status: EventStatus,
    pub payload: serde_json::Value,
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    pub fn new(status: EventStatus, payload: serde_json::Value, is_final: bool) -> Self {
        Self {
            status,
            payload,
            is_final,
            timestamp: Utc::now(),
        }
    }

    fn connected() -> Self {
        Self::new(EventStatus::Connected, serde_json::Value::Null, false)
    }

    fn ping() -> Self {
        Self::new(EventStatus::Ping, serde_json::Value::Null, false)
    }

    /// Whether delivering this event should close the subscriber's queue,
    /// after it has been flushed.
    fn terminates_stream(&self) -> bool {
        self.is_final && matches!(self.status, EventStatus::Complete | EventStatus::Error)
    }
}

/// A live subscription handle returned from [`EventStreamHub::subscribe`].
pub struct SubscriberHandle {
    pub project_id: ProjectId,
    pub subscriber_id: Uuid,
    pub receiver: mpsc::Receiver<StreamEvent>,
}

struct Subscriber {
    sender: mpsc::Sender<StreamEvent>,
    overflow_count: u64,
    last_delivered_at: Instant,
    closed: bool,
}

struct ProjectChannel {
    subscribers: HashMap<Uuid, Subscriber>,
    became_empty_at: Option<Instant>,
}

impl ProjectChannel {
    fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            became_empty_at: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MaintenanceReport {
    pub pings_sent: usize,
    pub projects_collected: usize,
}

/// The hub itself. Cheaply cloneable — internal state is behind an `Arc`.
#[derive(Clone)]
pub struct EventStreamHub {
    channels: Arc<RwLock<HashMap<ProjectId, ProjectChannel>>>,
    queue_capacity: usize,
}

impl Default for EventStreamHub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventStreamHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            queue_capacity,
        }
    }

    /// Create a new subscription, immediately delivering a synthetic
    /// `connected` event.
    pub async fn subscribe(&self, project_id: ProjectId) -> SubscriberHandle {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let subscriber_id = Uuid::new_v4();

        let _ = tx.send(StreamEvent::connected()).await;

        let mut channels = self.channels.write().await;
        let channel = channels
            .entry(project_id.clone())
            .or_insert_with(ProjectChannel::new);
        channel.became_empty_at = None;
        channel.subscribers.insert(
            subscriber_id,
            Subscriber {
                sender: tx,
                overflow_count: 0,
                last_delivered_at: Instant::now(),
                closed: false,
            },
        );

        SubscriberHandle {
            project_id,
            subscriber_id,
            receiver: rx,
        }
    }

    /// Publish an event to every subscriber of `project_id`. Non-blocking:
    /// a full subscriber queue drops the event for that subscriber only and
    /// increments its overflow counter.
    pub async fn publish(&self, project_id: &ProjectId, event: StreamEvent) {
        let mut channels = self.channels.write().await;
        let Some(channel) = channels.get_mut(project_id) else {
            return;
        };

        let mut to_close = Vec::new();
        for (id, subscriber) in channel.subscribers.iter_mut() {
            if subscriber.closed {
                continue;
            }
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {
                    subscriber.last_delivered_at = Instant::now();
                    if event.terminates_stream() {
                        to_close.push(*id);
                    }
                }
                Err(_) => {
                    subscriber.overflow_count += 1;
                }
            }
        }

        for id in to_close {
            if let Some(subscriber) = channel.subscribers.get_mut(&id) {
                subscriber.closed = true;
            }
            channel.subscribers.remove(&id);
        }

        if channel.subscribers.is_empty() {
            channel.became_empty_at = Some(Instant::now());
        }
    }

    /// Drive keepalive pings and idle garbage collection. Callers spawn a
    /// loop invoking this roughly once a second; `now` is injected so tests
    /// can simulate elapsed time without real sleeps.
    pub async fn run_maintenance_tick(&self, now: Instant) -> MaintenanceReport {
        let mut channels = self.channels.write().await;
        let mut report = MaintenanceReport::default();
        let mut empty_projects = Vec::new();

        for (project_id, channel) in channels.iter_mut() {
            for subscriber in channel.subscribers.values_mut() {
                if subscriber.closed {
                    continue;
                }
                if now.duration_since(subscriber.last_delivered_at) >= KEEPALIVE_INTERVAL {
                    if subscriber.sender.try_send(StreamEvent::ping()).is_ok() {
                        subscriber.last_delivered_at = now;
                        report.pings_sent += 1;
                    } else {
                        subscriber.overflow_count += 1;
                    }
                }
            }

            if channel.subscribers.is_empty() {
                if let Some(became_empty_at) = channel.became_empty_at {
                    if now.duration_since(became_empty_at) >= IDLE_GC_TIMEOUT {
                        empty_projects.push(project_id.clone());
                    }
                } else {
                    channel.became_empty_at = Some(now);
                }
            }
        }

        for project_id in &empty_projects {
            channels.remove(project_id);
        }
        report.projects_collected = empty_projects.len();

        report
    }

    /// Test/diagnostic accessor: how many events a subscriber has lost to
    /// backpressure.
    pub async fn overflow_count(&self, project_id: &ProjectId, subscriber_id: Uuid) -> Option<u64> {
        let channels = self.channels.read().await;
        channels
            .get(project_id)
            .and_then(|c| c.subscribers.get(&subscriber_id))
            .map(|s| s.overflow_count)
    }

    pub async fn subscriber_count(&self, project_id: &ProjectId) -> usize {
        let channels = self.channels.read().await;
        channels.get(project_id).map(|c| c.subscribers.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> ProjectId {
        ProjectId("proj-1".to_string())
    }

    #[tokio::test]
    async fn subscribe_delivers_connected_event_first() {
        let hub = EventStreamHub::default();
        let mut handle = hub.subscribe(pid()).await;
        let first = handle.receiver.recv().await.unwrap();
        assert_eq!(first.status, EventStatus::Connected);
    }

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let hub = EventStreamHub::default();
        let mut a = hub.subscribe(pid()).await;
        let mut b = hub.subscribe(pid()).await;
        a.receiver.recv().await;
        b.receiver.recv().await;

        hub.publish(
            &pid(),
            StreamEvent::new(EventStatus::InProgress, serde_json::json!({"x": 1}), false),
        )
        .await;

        assert_eq!(a.receiver.recv().await.unwrap().status, EventStatus::InProgress);
        assert_eq!(b.receiver.recv().await.unwrap().status, EventStatus::InProgress);
    }

    #[tokio::test]
    async fn full_queue_drops_for_that_subscriber_only() {
        let hub = EventStreamHub::new(1);
        let mut a = hub.subscribe(pid()).await;
        let mut b = hub.subscribe(pid()).await;
        a.receiver.recv().await;
        b.receiver.recv().await;

        // Fill subscriber a's single-slot queue without draining it.
        hub.publish(&pid(), StreamEvent::new(EventStatus::InProgress, serde_json::Value::Null, false))
            .await;
        hub.publish(&pid(), StreamEvent::new(EventStatus::InProgress, serde_json::Value::Null, false))
            .await;

        // b drained every publish, so it has no overflow; a's second publish overflowed.
        b.receiver.recv().await;
        assert!(hub.overflow_count(&pid(), a.subscriber_id).await.unwrap() >= 1);
    }

    #[tokio::test]
    async fn final_complete_event_closes_subscriber() {
        let hub = EventStreamHub::default();
        let mut handle = hub.subscribe(pid()).await;
        handle.receiver.recv().await;

        hub.publish(
            &pid(),
            StreamEvent::new(EventStatus::Complete, serde_json::Value::Null, true),
        )
        .await;

        handle.receiver.recv().await.unwrap();
        assert_eq!(hub.subscriber_count(&pid()).await, 0);
    }

    #[tokio::test]
    async fn maintenance_tick_pings_idle_subscribers() {
        let hub = EventStreamHub::default();
        let mut handle = hub.subscribe(pid()).await;
        handle.receiver.recv().await;

        let future = Instant::now() + KEEPALIVE_INTERVAL + Duration::from_secs(1);
        let report = hub.run_maintenance_tick(future).await;
        assert_eq!(report.pings_sent, 1);
        assert_eq!(handle.receiver.recv().await.unwrap().status, EventStatus::Ping);
    }

    #[tokio::test]
    async fn maintenance_tick_collects_idle_empty_project() {
        let hub = EventStreamHub::default();
        {
            let mut handle = hub.subscribe(pid()).await;
            handle.receiver.recv().await;
        } // handle dropped, but hub still holds the sender until we publish a terminal event

        hub.publish(
            &pid(),
            StreamEvent::new(EventStatus::Complete, serde_json::Value::Null, true),
        )
        .await;

        let t0 = Instant::now();
        hub.run_maintenance_tick(t0).await;
        let report = hub.run_maintenance_tick(t0 + IDLE_GC_TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(report.projects_collected, 1);
    }
}
