//! Event Fan-out (C5, spec.md §4.5): a subscription registry keyed by
//! mission id plus a single "global" key for administrative subscribers.
//! Publish is non-blocking from the producer's perspective: a subscriber
//! whose outbound buffer is full is disconnected rather than stalling the
//! publisher (SPEC_FULL.md §9: "bounded outbound buffers ... disconnecting
//! on overflow rather than blocking the publisher").

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::domain::models::event::Event;

/// Outbound buffer depth per subscriber. A slow consumer backs up to this
/// many events before being dropped on the next publish.
const SUBSCRIBER_BUFFER: usize = 256;

type SubscriberId = Uuid;

struct Inner {
    per_mission: HashMap<Uuid, HashMap<SubscriberId, mpsc::Sender<Event>>>,
    global: HashMap<SubscriberId, mpsc::Sender<Event>>,
}

/// Cheap-to-clone handle around the subscription registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { per_mission: HashMap::new(), global: HashMap::new() })),
        }
    }

    /// Subscribes to one mission's event stream. Returns the subscriber id
    /// (used to `unsubscribe`) and the receiving half of its channel.
    pub async fn subscribe(&self, mission_id: Uuid) -> (SubscriberId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let subscriber_id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner.per_mission.entry(mission_id).or_default().insert(subscriber_id, tx);
        (subscriber_id, rx)
    }

    pub async fn unsubscribe(&self, mission_id: Uuid, subscriber_id: SubscriberId) {
        let mut inner = self.inner.lock().await;
        if let Some(group) = inner.per_mission.get_mut(&mission_id) {
            group.remove(&subscriber_id);
        }
    }

    /// Subscribes to every mission's events (administrative channel).
    pub async fn subscribe_global(&self) -> (SubscriberId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let subscriber_id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner.global.insert(subscriber_id, tx);
        (subscriber_id, rx)
    }

    pub async fn unsubscribe_global(&self, subscriber_id: SubscriberId) {
        let mut inner = self.inner.lock().await;
        inner.global.remove(&subscriber_id);
    }

    /// Delivers `event` to every subscriber of its mission plus every global
    /// subscriber. Takes a snapshot of senders and releases the lock before
    /// sending, per the no-blocking-while-locked rule (spec.md §5). A
    /// subscriber whose buffer is full is dropped rather than retried.
    pub async fn publish(&self, event: Event) {
        let mission_id = event.mission_id;
        let mut dead_mission = Vec::new();
        let mut dead_global = Vec::new();

        let (mission_targets, global_targets) = {
            let inner = self.inner.lock().await;
            let mission_targets: Vec<(SubscriberId, mpsc::Sender<Event>)> = inner
                .per_mission
                .get(&mission_id)
                .map(|group| group.iter().map(|(id, tx)| (*id, tx.clone())).collect())
                .unwrap_or_default();
            let global_targets: Vec<(SubscriberId, mpsc::Sender<Event>)> =
                inner.global.iter().map(|(id, tx)| (*id, tx.clone())).collect();
            (mission_targets, global_targets)
        };

        for (id, tx) in mission_targets {
            if tx.try_send(event.clone()).is_err() {
                dead_mission.push(id);
            }
        }
        for (id, tx) in global_targets {
            if tx.try_send(event.clone()).is_err() {
                dead_global.push(id);
            }
        }

        if !dead_mission.is_empty() || !dead_global.is_empty() {
            let mut inner = self.inner.lock().await;
            if let Some(group) = inner.per_mission.get_mut(&mission_id) {
                for id in dead_mission {
                    group.remove(&id);
                }
            }
            for id in dead_global {
                inner.global.remove(&id);
            }
        }

        if event.is_terminal_mission_event() {
            self.cleanup_mission(mission_id).await;
        }
    }

    /// Drops the mission's subscriber group. Called after a terminal mission
    /// event has been published (spec.md §4.5).
    pub async fn cleanup_mission(&self, mission_id: Uuid) {
        let mut inner = self.inner.lock().await;
        inner.per_mission.remove(&mission_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::event::EventKind;

    #[tokio::test]
    async fn per_mission_subscriber_receives_only_its_mission() {
        let bus = EventBus::new();
        let mission_a = Uuid::new_v4();
        let mission_b = Uuid::new_v4();
        let (_id, mut rx_a) = bus.subscribe(mission_a).await;
        let (_id, mut _rx_b) = bus.subscribe(mission_b).await;

        bus.publish(Event::new(mission_a, EventKind::MissionStarted)).await;
        bus.publish(Event::new(mission_b, EventKind::MissionStarted)).await;

        let received = rx_a.recv().await.unwrap();
        assert_eq!(received.mission_id, mission_a);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn global_subscriber_receives_all_missions() {
        let bus = EventBus::new();
        let mission_a = Uuid::new_v4();
        let mission_b = Uuid::new_v4();
        let (_id, mut rx) = bus.subscribe_global().await;

        bus.publish(Event::new(mission_a, EventKind::MissionStarted)).await;
        bus.publish(Event::new(mission_b, EventKind::MissionStarted)).await;

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn terminal_mission_event_triggers_cleanup() {
        let bus = EventBus::new();
        let mission = Uuid::new_v4();
        let (_id, mut rx) = bus.subscribe(mission).await;

        bus.publish(Event::new(
            mission,
            EventKind::MissionCompleted { duration_ms: 1, workspace_path: "/tmp".into(), completed_tasks: 1, failed_tasks: 0 },
        ))
        .await;
        rx.recv().await.unwrap();

        {
            let inner = bus.inner.lock().await;
            assert!(!inner.per_mission.contains_key(&mission));
        }
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new();
        let mission = Uuid::new_v4();
        let (id, mut rx) = bus.subscribe(mission).await;
        bus.unsubscribe(mission, id).await;

        bus.publish(Event::new(mission, EventKind::MissionStarted)).await;
        assert!(rx.try_recv().is_err());
    }
}
