//! Three per-QoS FIFOs with strict or weighted-4:2:1 scheduling, an
//! in-flight map, and an archive list for exhausted-retry messages
//! (spec §4.5).

use std::collections::{HashMap, VecDeque};

use crate::config::{Qos, SchedulingPolicy};

pub const TOTAL_CAP_BYTES: usize = 48 * 1024;
pub const HIGH_CAP_BYTES: usize = 24 * 1024;
pub const NORMAL_CAP_BYTES: usize = 16 * 1024;
pub const LOW_CAP_BYTES: usize = 12 * 1024;
pub const MAX_MESSAGES: usize = 256;

fn qos_cap_bytes(qos: Qos) -> usize {
    match qos {
        Qos::High => HIGH_CAP_BYTES,
        Qos::Normal => NORMAL_CAP_BYTES,
        Qos::Low => LOW_CAP_BYTES,
    }
}

/// An application message awaiting transmission or acknowledgement.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub id: u32,
    pub ack_required: bool,
    pub qos: Qos,
    pub data: Vec<u8>,
}

/// The 7-slot weighted round-robin pattern `[H,H,H,H,N,N,L]`.
const WEIGHTED_PATTERN: [Qos; 7] = [
    Qos::High,
    Qos::High,
    Qos::High,
    Qos::High,
    Qos::Normal,
    Qos::Normal,
    Qos::Low,
];

pub struct MessageCache {
    policy: SchedulingPolicy,
    queues: HashMap<Qos, VecDeque<OutgoingMessage>>,
    inflight: HashMap<u32, OutgoingMessage>,
    archive: Vec<OutgoingMessage>,
    next_id: u32,
    total_bytes: usize,
    per_qos_bytes: HashMap<Qos, usize>,
    total_messages: usize,
    weighted_cursor: usize,
}

impl MessageCache {
    pub fn new(policy: SchedulingPolicy) -> Self {
        let mut queues = HashMap::new();
        let mut per_qos_bytes = HashMap::new();
        for qos in Qos::ALL {
            queues.insert(qos, VecDeque::new());
            per_qos_bytes.insert(qos, 0);
        }
        Self {
            policy,
            queues,
            inflight: HashMap::new(),
            archive: Vec::new(),
            next_id: 1,
            total_bytes: 0,
            per_qos_bytes,
            total_messages: 0,
            weighted_cursor: 0,
        }
    }

    /// Allocate a monotonic msg_id and append to the QoS queue. Returns 0
    /// (never a valid id) on capacity overflow, per spec §7's "reject".
    pub fn enqueue(&mut self, data: Vec<u8>, ack_required: bool, qos: Qos) -> u32 {
        let msg_bytes = data.len();
        if self.total_messages >= MAX_MESSAGES
            || self.total_bytes + msg_bytes > TOTAL_CAP_BYTES
            || self.per_qos_bytes[&qos] + msg_bytes > qos_cap_bytes(qos)
        {
            return 0;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.total_bytes += msg_bytes;
        *self.per_qos_bytes.get_mut(&qos).unwrap() += msg_bytes;
        self.total_messages += 1;
        self.queues.get_mut(&qos).unwrap().push_back(OutgoingMessage {
            id,
            ack_required,
            qos,
            data,
        });
        id
    }

    fn pop_front(&mut self, qos: Qos) -> Option<OutgoingMessage> {
        let msg = self.queues.get_mut(&qos)?.pop_front()?;
        self.total_bytes -= msg.data.len();
        *self.per_qos_bytes.get_mut(&qos).unwrap() -= msg.data.len();
        self.total_messages -= 1;
        Some(msg)
    }

    fn is_empty(&self, qos: Qos) -> bool {
        self.queues[&qos].is_empty()
    }

    /// Select and remove the next message per the configured policy,
    /// moving it into the in-flight map.
    pub fn peek(&mut self) -> Option<&OutgoingMessage> {
        let msg = match self.policy {
            SchedulingPolicy::Strict => {
                let qos = Qos::ALL.into_iter().find(|&q| !self.is_empty(q))?;
                self.pop_front(qos)?
            }
            SchedulingPolicy::Weighted421 => {
                let mut attempts = 0;
                loop {
                    if attempts >= WEIGHTED_PATTERN.len() {
                        return None;
                    }
                    let qos = WEIGHTED_PATTERN[self.weighted_cursor % WEIGHTED_PATTERN.len()];
                    self.weighted_cursor = (self.weighted_cursor + 1) % WEIGHTED_PATTERN.len();
                    attempts += 1;
                    if !self.is_empty(qos) {
                        break self.pop_front(qos)?;
                    }
                }
            }
        };
        let id = msg.id;
        self.inflight.insert(id, msg);
        self.inflight.get(&id)
    }

    pub fn inflight(&self, id: u32) -> Option<&OutgoingMessage> {
        self.inflight.get(&id)
    }

    /// Remove `id` from in-flight (and, for safety, from the archive) on a
    /// positive cumulative ACK.
    pub fn mark_acked(&mut self, id: u32) {
        self.inflight.remove(&id);
        self.archive.retain(|m| m.id != id);
    }

    /// Move an in-flight message to the archive after ARQ exhaustion.
    pub fn archive(&mut self, id: u32) {
        if let Some(msg) = self.inflight.remove(&id) {
            self.archive.push(msg);
        }
    }

    /// Return up to `k` archived messages to the head of their original
    /// queue, preserving msg_id. Eligible only after a positive ACK event
    /// removed an in-flight entry (spec §3 invariant) — callers invoke this
    /// from `on_ack`, never speculatively.
    pub fn restore_archived(&mut self, k: usize) -> usize {
        let mut restored = 0;
        while restored < k {
            let Some(msg) = self.archive.pop() else {
                break;
            };
            let qos = msg.qos;
            self.total_bytes += msg.data.len();
            *self.per_qos_bytes.get_mut(&qos).unwrap() += msg.data.len();
            self.total_messages += 1;
            self.queues.get_mut(&qos).unwrap().push_front(msg);
            restored += 1;
        }
        restored
    }

    pub fn archive_len(&self) -> usize {
        self.archive.len()
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_message_queue_empty(&self) -> bool {
        Qos::ALL.iter().all(|&q| self.is_empty(q)) && self.inflight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_ids_are_monotonic_and_never_reused() {
        let mut cache = MessageCache::new(SchedulingPolicy::Strict);
        let a = cache.enqueue(vec![1], false, Qos::High);
        let b = cache.enqueue(vec![2], false, Qos::High);
        assert!(b > a);
        cache.archive(a); // a isn't even inflight yet; no-op, but id stays spent
        let c = cache.enqueue(vec![3], false, Qos::High);
        assert!(c > b);
    }

    #[test]
    fn strict_policy_drains_high_first() {
        let mut cache = MessageCache::new(SchedulingPolicy::Strict);
        cache.enqueue(vec![1], false, Qos::Low);
        cache.enqueue(vec![2], false, Qos::High);
        let first = cache.peek().unwrap().qos;
        assert_eq!(first, Qos::High);
    }

    #[test]
    fn weighted_pattern_serves_four_high_before_normal() {
        let mut cache = MessageCache::new(SchedulingPolicy::Weighted421);
        for _ in 0..4 {
            cache.enqueue(vec![0], false, Qos::High);
        }
        cache.enqueue(vec![0], false, Qos::Normal);
        let mut order = Vec::new();
        for _ in 0..5 {
            order.push(cache.peek().unwrap().qos);
        }
        assert_eq!(
            order,
            vec![Qos::High, Qos::High, Qos::High, Qos::High, Qos::Normal]
        );
    }

    #[test]
    fn archive_and_restore_preserves_msg_id() {
        let mut cache = MessageCache::new(SchedulingPolicy::Strict);
        let id = cache.enqueue(vec![9, 9], true, Qos::High);
        cache.peek(); // moves to inflight
        cache.archive(id);
        assert_eq!(cache.archive_len(), 1);
        let restored = cache.restore_archived(1);
        assert_eq!(restored, 1);
        let msg = cache.peek().unwrap();
        assert_eq!(msg.id, id);
    }

    #[test]
    fn capacity_overflow_rejects_with_zero() {
        let mut cache = MessageCache::new(SchedulingPolicy::Strict);
        let huge = vec![0u8; LOW_CAP_BYTES + 1];
        assert_eq!(cache.enqueue(huge, false, Qos::Low), 0);
    }

    #[test]
    fn mark_acked_clears_inflight_and_archive() {
        let mut cache = MessageCache::new(SchedulingPolicy::Strict);
        let id = cache.enqueue(vec![1], true, Qos::High);
        cache.peek();
        cache.mark_acked(id);
        assert_eq!(cache.inflight_len(), 0);
    }

    use proptest::prelude::*;
    use proptest::proptest;

    proptest! {
        #[test]
        fn prop_msg_ids_strictly_increase_across_arbitrary_operations(
            ops in proptest::collection::vec(0u8..4, 1..64),
        ) {
            let mut cache = MessageCache::new(SchedulingPolicy::Weighted421);
            let mut last_id = 0u32;
            for op in ops {
                match op {
                    0 => {
                        let id = cache.enqueue(vec![0u8; 4], false, Qos::High);
                        if id != 0 {
                            prop_assert!(id > last_id);
                            last_id = id;
                        }
                    }
                    1 => {
                        let id = cache.enqueue(vec![0u8; 4], true, Qos::Normal);
                        if id != 0 {
                            prop_assert!(id > last_id);
                            last_id = id;
                        }
                    }
                    2 => {
                        if let Some(msg) = cache.peek() {
                            let id = msg.id;
                            cache.archive(id);
                        }
                    }
                    _ => {
                        let _ = cache.restore_archived(1);
                    }
                }
            }
        }
    }
}
