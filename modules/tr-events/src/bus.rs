//! Single-process pub/sub bus (spec.md §4.8). Subscriber list is guarded by
//! a read-write lock — publishes take the read lock, subscribe/unsubscribe
//! take the write lock (spec.md §5). The replay ring is a separate lock so
//! a publish never blocks on subscriber churn and vice versa.

use crate::filter::Filter;
use crate::types::BusEvent;
use chrono::Duration as ChronoDuration;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

struct Subscriber {
    id: Uuid,
    filter: Filter,
    tx: mpsc::Sender<BusEvent>,
}

pub struct Subscription {
    pub id: Uuid,
    pub rx: mpsc::Receiver<BusEvent>,
}

pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    ring: Mutex<VecDeque<BusEvent>>,
    seq: AtomicU64,
    ring_capacity: usize,
    ring_window: Duration,
    channel_capacity: usize,
}

impl EventBus {
    pub fn new(ring_capacity: usize, ring_window: Duration, channel_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            ring: Mutex::new(VecDeque::new()),
            seq: AtomicU64::new(0),
            ring_capacity,
            ring_window,
            channel_capacity,
        }
    }

    /// Publish one event. Assigns its `event_id`, appends it to the replay
    /// ring, and fans it out to every matching subscriber. A subscriber
    /// whose channel is full is disconnected rather than allowed to block
    /// this call (spec.md §4.8, §7).
    pub fn publish(&self, mut event: BusEvent) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        event.event_id = encode_seq(seq);

        {
            let mut ring = self.ring.lock().expect("event bus ring lock poisoned");
            ring.push_back(event.clone());
            trim_ring(&mut ring, self.ring_capacity, self.ring_window);
        }

        let subscribers = self
            .subscribers
            .read()
            .expect("event bus subscriber lock poisoned");
        let mut dead = Vec::new();
        for sub in subscribers.iter() {
            if !sub.filter.matches(&event) {
                continue;
            }
            if sub.tx.try_send(event.clone()).is_err() {
                dead.push(sub.id);
            }
        }
        drop(subscribers);

        if !dead.is_empty() {
            tracing::info!(count = dead.len(), "disconnecting slow subscribers");
            self.remove(&dead);
        }
    }

    /// Register a subscriber. If `last_event_id` is set, replays missed
    /// matching events from the ring first (spec.md §4.8 / invariant 6)
    /// before the subscription starts receiving live events.
    pub fn subscribe(&self, filter: Filter, last_event_id: Option<&str>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let id = Uuid::new_v4();

        let replay = {
            let ring = self.ring.lock().expect("event bus ring lock poisoned");
            compute_replay(&ring, &filter, last_event_id)
        };
        for event in replay {
            if tx.try_send(event).is_err() {
                tracing::warn!(subscriber = %id, "replay event dropped, channel full at subscribe time");
            }
        }

        let mut subs = self
            .subscribers
            .write()
            .expect("event bus subscriber lock poisoned");
        subs.push(Subscriber { id, filter, tx });

        Subscription { id, rx }
    }

    /// Closes the subscriber's channel (receiver observes end-of-stream)
    /// and removes it from the registry.
    pub fn unsubscribe(&self, id: Uuid) {
        self.remove(&[id]);
    }

    fn remove(&self, ids: &[Uuid]) {
        let mut subs = self
            .subscribers
            .write()
            .expect("event bus subscriber lock poisoned");
        subs.retain(|s| !ids.contains(&s.id));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("event bus subscriber lock poisoned")
            .len()
    }
}

fn encode_seq(seq: u64) -> String {
    format!("{seq:020}")
}

fn decode_seq(id: &str) -> Option<u64> {
    id.parse().ok()
}

fn trim_ring(ring: &mut VecDeque<BusEvent>, capacity: usize, window: Duration) {
    while ring.len() > capacity {
        ring.pop_front();
    }
    let window = ChronoDuration::from_std(window).unwrap_or(ChronoDuration::seconds(60));
    let cutoff = chrono::Utc::now() - window;
    while ring.front().map(|e| e.timestamp < cutoff).unwrap_or(false) {
        ring.pop_front();
    }
}

/// Invariant 6: if the presented id is still within the ring, deliver
/// exactly the events strictly after it. If it has fallen out of the ring
/// (or is unparsable), the non-silent fallback delivers everything the
/// ring currently holds rather than nothing.
fn compute_replay(ring: &VecDeque<BusEvent>, filter: &Filter, last_event_id: Option<&str>) -> Vec<BusEvent> {
    let Some(last_id) = last_event_id else {
        return Vec::new();
    };
    let Some(last_seq) = decode_seq(last_id) else {
        return Vec::new();
    };
    let oldest_retained = ring.front().and_then(|e| decode_seq(&e.event_id));
    let within_ring = oldest_retained.map(|first| last_seq >= first).unwrap_or(true);

    ring.iter()
        .filter(|e| filter.matches(e))
        .filter(|e| {
            if within_ring {
                decode_seq(&e.event_id).map(|s| s > last_seq).unwrap_or(false)
            } else {
                true
            }
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bus() -> EventBus {
        EventBus::new(10, Duration::from_secs(60), 16)
    }

    fn event(event_type: &str) -> BusEvent {
        BusEvent::new(event_type, json!({}))
    }

    #[test]
    fn filters_are_honored_under_and_across_or_within_semantics() {
        let bus = bus();
        let system_a = Uuid::new_v4();
        let system_b = Uuid::new_v4();
        let mut sub = bus.subscribe(
            Filter {
                systems: vec![system_a, system_b],
                tgids: vec![100],
                ..Default::default()
            },
            None,
        );

        bus.publish(event("call_start").with_system(system_a).with_tgid(100));
        bus.publish(event("call_start").with_system(system_a).with_tgid(200));
        bus.publish(event("call_start").with_system(system_b).with_tgid(100));

        let first = sub.rx.try_recv().unwrap();
        assert_eq!(first.system_id, Some(system_a));
        let second = sub.rx.try_recv().unwrap();
        assert_eq!(second.system_id, Some(system_b));
        assert!(sub.rx.try_recv().is_err());
    }

    #[test]
    fn replay_delivers_only_ids_strictly_after_presented_one() {
        let bus = bus();
        for i in 0..5 {
            bus.publish(event("call_start").with_tgid(i));
        }
        let mut sub = bus.subscribe(Filter::default(), Some(&encode_seq(1)));
        let replayed: Vec<_> = std::iter::from_fn(|| sub.rx.try_recv().ok()).collect();
        assert_eq!(replayed.len(), 3);
        assert_eq!(replayed[0].tgid, Some(2));
        assert_eq!(replayed[2].tgid, Some(4));
    }

    #[test]
    fn replay_falls_back_to_full_ring_when_presented_id_has_aged_out() {
        let bus = EventBus::new(3, Duration::from_secs(60), 16);
        for i in 0..5 {
            bus.publish(event("call_start").with_tgid(i));
        }
        // seq 0 and 1 have already been evicted by the capacity-3 ring.
        let mut sub = bus.subscribe(Filter::default(), Some(&encode_seq(0)));
        let replayed: Vec<_> = std::iter::from_fn(|| sub.rx.try_recv().ok()).collect();
        assert_eq!(replayed.len(), 3);
        assert_eq!(replayed[0].tgid, Some(2));
    }

    #[test]
    fn slow_subscriber_is_disconnected_not_blocking() {
        let bus = EventBus::new(10, Duration::from_secs(60), 1);
        let sub = bus.subscribe(Filter::default(), None);
        bus.publish(event("call_start"));
        bus.publish(event("call_start"));
        assert_eq!(bus.subscriber_count(), 0);
        drop(sub);
    }
}
