//! TX pipeline: formatting, ARQ, burst/window control, backoff, ACK
//! bookkeeping (spec §4.6).

use std::collections::{HashMap, VecDeque};

use crate::ack::AckBitmap;
use crate::cache::{MessageCache, OutgoingMessage};
use crate::channel::ChannelCodec;
use crate::config::{LinkConfig, Qos};
use crate::crypto::KeyStore;
use crate::formatter::PacketFormatter;
use crate::logging::{log_debug, log_info, log_warn};
use crate::metrics::{Ewma, Metrics};
use crate::radio::Radio;
use crate::tdd::TddScheduler;

struct PendingArq {
    msg: OutgoingMessage,
    retries_left: u8,
    first_sent_ms: u64,
    last_tx_ms: u64,
    timeout_ms: u32,
    backoff_stage: u32,
}

pub struct TxPipeline {
    pub config: LinkConfig,
    pub cache: MessageCache,
    pub key_store: KeyStore,
    pub channel: ChannelCodec,
    pub metrics: Metrics,
    pending: HashMap<u32, PendingArq>,
    ack_queue: VecDeque<AckBitmap>,
    last_tx_ms: u64,
    burst_sent: u8,
    burst_wait_start_ms: Option<u64>,
    ack_time_ms_avg: Ewma,
}

impl TxPipeline {
    pub fn new(config: LinkConfig, channel: ChannelCodec) -> Self {
        let scheduling = config.scheduling;
        Self {
            config,
            cache: MessageCache::new(scheduling),
            key_store: KeyStore::new(),
            channel,
            metrics: Metrics::new(),
            pending: HashMap::new(),
            ack_queue: VecDeque::new(),
            last_tx_ms: 0,
            burst_sent: 0,
            burst_wait_start_ms: None,
            ack_time_ms_avg: Ewma::new(0.25),
        }
    }

    pub fn enqueue(&mut self, bytes: Vec<u8>, ack_required: bool, qos: Qos) -> u32 {
        self.cache.enqueue(bytes, ack_required, qos)
    }

    /// Invoked by RX when an ACK frame arrives. Per the concurrency model
    /// (spec §5), RX must never call into the cache/TX state directly — the
    /// ACK is queued here and drained at the top of the next `tick()`.
    pub fn on_ack(&mut self, ack: AckBitmap) {
        self.ack_queue.push_back(ack);
    }

    pub fn set_window(&mut self, n: u8) {
        self.config.window = n.max(1);
    }

    pub fn set_burst(&mut self, n: u8) {
        self.config.burst_limit = n.max(1);
    }

    pub fn set_header_dup(&mut self, on: bool) {
        self.config.header_dup = on;
    }

    pub fn set_ack(&mut self, on: bool) {
        self.config.ack_required_default = on;
    }

    fn drain_acks(&mut self, now_ms: u64) {
        while let Some(ack) = self.ack_queue.pop_front() {
            for id in ack.acknowledged_ids() {
                if let Some(entry) = self.pending.remove(&id) {
                    let rtt = now_ms.saturating_sub(entry.first_sent_ms) as f64;
                    self.ack_time_ms_avg.update(rtt);
                    self.metrics.ack_seen += 1;
                    self.cache.mark_acked(id);
                    self.cache.restore_archived(1);
                    self.burst_sent = self.burst_sent.saturating_sub(1);
                }
            }
        }
    }

    fn formatter(&self) -> PacketFormatter<'_> {
        PacketFormatter {
            key_store: &self.key_store,
            channel: &self.channel,
            config: &self.config,
        }
    }

    fn send_message(&mut self, msg: &OutgoingMessage, now_ms: u64, radio: &mut dyn Radio) {
        let formatter = PacketFormatter {
            key_store: &self.key_store,
            channel: &self.channel,
            config: &self.config,
        };
        let frames = formatter.prepare(msg, &mut self.metrics);
        for frame in &frames {
            radio.send_raw(&frame.on_air_bytes, msg.qos);
            self.metrics.tx_frames += 1;
            self.metrics.tx_bytes += frame.on_air_bytes.len() as u64;
            self.burst_sent += 1;
            log_debug(&format!(
                "tx frame msg_id={} frag_idx={}/{} bytes={}",
                frame.header.msg_id,
                frame.header.frag_idx,
                frame.header.frag_cnt,
                frame.on_air_bytes.len()
            ));
        }
        self.last_tx_ms = now_ms;
    }

    fn check_arq_timeouts(&mut self, now_ms: u64, radio: &mut dyn Radio) {
        let expired: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, e)| now_ms.saturating_sub(e.last_tx_ms) >= e.timeout_ms as u64)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            let Some(mut entry) = self.pending.remove(&id) else {
                continue;
            };
            if entry.retries_left > 0 {
                entry.retries_left -= 1;
                entry.backoff_stage += 1;
                let scaled = (self.config.ack_timeout_ms as u64) << entry.backoff_stage.min(16);
                entry.timeout_ms = scaled.min(self.config.ack_timeout_cap_ms as u64) as u32;
                self.metrics.tx_retries += 1;
                log_info(&format!(
                    "arq retry msg_id={id} backoff_stage={} retries_left={}",
                    entry.backoff_stage, entry.retries_left
                ));
                self.send_message(&entry.msg.clone(), now_ms, radio);
                entry.last_tx_ms = now_ms;
                self.pending.insert(id, entry);
            } else {
                self.metrics.ack_fail += 1;
                log_warn(&format!("arq exhausted msg_id={id}, archiving"));
                self.cache.archive(id);
            }
        }
    }

    /// Advance the state machine by one step. Non-blocking; returns
    /// immediately on every early-exit condition in spec §4.6.
    pub fn tick(&mut self, now_ms: u64, tdd: &TddScheduler, radio: &mut dyn Radio) {
        if !tdd.is_tx(now_ms) {
            return;
        }

        self.drain_acks(now_ms);
        self.check_arq_timeouts(now_ms, radio);

        if now_ms.saturating_sub(self.last_tx_ms) < self.config.inter_frame_gap_ms as u64 {
            return;
        }

        if self.burst_sent >= self.config.burst_limit {
            match self.burst_wait_start_ms {
                Some(start) if now_ms.saturating_sub(start) < self.config.ack_timeout_ms as u64 => {
                    return;
                }
                _ => {
                    self.burst_sent = 0;
                    self.burst_wait_start_ms = None;
                }
            }
        }

        if self.pending.len() >= self.config.window as usize {
            return;
        }

        let Some(msg) = self.cache.peek().cloned() else {
            return;
        };
        self.send_message(&msg, now_ms, radio);
        self.pending.insert(
            msg.id,
            PendingArq {
                msg,
                retries_left: self.config.max_retries,
                first_sent_ms: now_ms,
                last_tx_ms: now_ms,
                timeout_ms: self.config.ack_timeout_ms,
                backoff_stage: 0,
            },
        );
        if self.burst_sent >= self.config.burst_limit {
            self.burst_wait_start_ms = Some(now_ms);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
