//! RX pipeline: frame validation, decrypt, channel decode, reassembly,
//! duplicate suppression and ACK generation (spec §4.8).

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ack::AckBitmap;
use crate::channel::ChannelCodec;
use crate::config::LinkConfig;
use crate::crypto::{self, KeyStore};
use crate::formatter::PacketFormatter;
use crate::frame::{self, FrameFlags};
use crate::logging::log_debug;
use crate::metrics::Metrics;
use crate::tdd::TddScheduler;

const DUP_WINDOW_CAP: usize = 64;
const MAX_ASSEMBLERS: usize = 8;
const ASSEMBLER_PER_MSG_CAP_BYTES: usize = 8 * 1024;
const ASSEMBLER_AGGREGATE_CAP_BYTES: usize = 64 * 1024;
const ASSEMBLER_TTL_MS: u64 = 15_000;

/// Something worth telling the caller about: a fully reassembled message, or
/// an ACK frame that arrived and should be handed to the TX pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxEvent {
    Message { msg_id: u32, data: Vec<u8> },
    Ack(AckBitmap),
}

struct Assembler {
    frag_cnt: u16,
    frags: Vec<Option<Vec<u8>>>,
    first_seen_ms: u64,
    total_bytes: usize,
    ack_required: bool,
}

impl Assembler {
    fn new(frag_cnt: u16, first_seen_ms: u64) -> Self {
        Self {
            frag_cnt,
            frags: vec![None; frag_cnt as usize],
            first_seen_ms,
            total_bytes: 0,
            ack_required: false,
        }
    }

    fn is_complete(&self) -> bool {
        self.frags.iter().all(Option::is_some)
    }

    fn assemble(&self) -> Vec<u8> {
        self.frags.iter().flatten().flat_map(|f| f.iter().copied()).collect()
    }
}

/// Insertion-ordered, fixed-capacity duplicate filter over recently-seen
/// fully-assembled `msg_id`s.
struct DupWindow {
    order: VecDeque<u32>,
    seen: HashSet<u32>,
}

impl DupWindow {
    fn new() -> Self {
        Self {
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    fn contains(&self, id: u32) -> bool {
        self.seen.contains(&id)
    }

    fn insert(&mut self, id: u32) {
        if self.seen.insert(id) {
            self.order.push_back(id);
        }
    }

    fn trim(&mut self) {
        while self.order.len() > DUP_WINDOW_CAP {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}

pub struct RxPipeline {
    pub config: LinkConfig,
    pub key_store: KeyStore,
    pub channel: ChannelCodec,
    pub metrics: Metrics,
    dup_window: DupWindow,
    assemblers: HashMap<u32, Assembler>,
    assembler_bytes: usize,
    ack_highest: u32,
    ack_bitmap: AckBitmap,
    ack_dirty: bool,
    last_ack_emit_ms: Option<u64>,
}

impl RxPipeline {
    pub fn new(config: LinkConfig, channel: ChannelCodec) -> Self {
        Self {
            config,
            key_store: KeyStore::new(),
            channel,
            metrics: Metrics::new(),
            dup_window: DupWindow::new(),
            assemblers: HashMap::new(),
            assembler_bytes: 0,
            ack_highest: 0,
            ack_bitmap: AckBitmap::default(),
            ack_dirty: false,
            last_ack_emit_ms: None,
        }
    }

    fn record_ack_required_completion(&mut self, msg_id: u32) {
        self.ack_bitmap.record_completed(msg_id);
        self.ack_highest = self.ack_bitmap.highest;
        self.ack_dirty = true;
    }

    fn deliver(&mut self, msg_id: u32, data: Vec<u8>, ack_required: bool) -> Option<RxEvent> {
        if self.dup_window.contains(msg_id) {
            self.metrics.rx_dup_msgs += 1;
            return None;
        }
        self.dup_window.insert(msg_id);
        self.metrics.rx_msgs_ok += 1;
        if ack_required {
            self.record_ack_required_completion(msg_id);
        }
        Some(RxEvent::Message { msg_id, data })
    }

    fn handle_fragment(&mut self, msg_id: u32, frag_idx: u16, frag_cnt: u16, ack_required: bool, now_ms: u64, payload: Vec<u8>) -> Option<RxEvent> {
        if !self.assemblers.contains_key(&msg_id) {
            if self.assemblers.len() >= MAX_ASSEMBLERS {
                self.metrics.rx_assem_drop_overflow += 1;
                return None;
            }
            self.assemblers.insert(msg_id, Assembler::new(frag_cnt, now_ms));
        }

        let frag_len = payload.len();
        let Some(asm) = self.assemblers.get_mut(&msg_id) else {
            return None;
        };
        if asm.total_bytes + frag_len > ASSEMBLER_PER_MSG_CAP_BYTES
            || self.assembler_bytes + frag_len > ASSEMBLER_AGGREGATE_CAP_BYTES
        {
            self.metrics.rx_assem_drop_overflow += 1;
            self.assembler_bytes -= asm.total_bytes;
            self.assemblers.remove(&msg_id);
            return None;
        }

        let idx = frag_idx as usize;
        if idx < asm.frags.len() && asm.frags[idx].is_none() {
            asm.total_bytes += frag_len;
            self.assembler_bytes += frag_len;
            asm.frags[idx] = Some(payload);
        }
        if ack_required {
            asm.ack_required = true;
        }

        let Some(asm) = self.assemblers.get(&msg_id) else {
            return None;
        };
        if !asm.is_complete() {
            return None;
        }
        let data = asm.assemble();
        let ack_required = asm.ack_required;
        self.assembler_bytes -= asm.total_bytes;
        self.assemblers.remove(&msg_id);
        self.deliver(msg_id, data, ack_required)
    }

    /// Process one demodulated frame. Invoked from any context; per the
    /// concurrency model (spec §5) this must never call back into the TX
    /// pipeline directly — ACK events are handed back to the caller, who
    /// queues them into `TxPipeline::on_ack`.
    pub fn on_receive(&mut self, bytes: &[u8], now_ms: u64) -> Option<RxEvent> {
        let result = self.on_receive_inner(bytes, now_ms);
        self.gc(now_ms);
        result
    }

    fn on_receive_inner(&mut self, bytes: &[u8], now_ms: u64) -> Option<RxEvent> {
        if bytes.len() < frame::HEADER_LEN {
            return None;
        }

        let Some(parsed) = frame::parse_preamble(bytes, self.config.header_dup) else {
            // Version mismatch, too-short, or both header copies failing
            // their CRC are collapsed into one counter; this engine never
            // negotiates protocol version, so that collapse is not
            // observable in practice (see DESIGN.md).
            self.metrics.rx_crc_fail += 1;
            log_debug("rx frame dropped: header crc fail");
            return None;
        };
        let header = parsed.header;

        let expected_total = parsed.payload_offset + header.payload_len as usize;
        if expected_total != bytes.len() {
            self.metrics.rx_drop_len_mismatch += 1;
            log_debug(&format!("rx frame dropped: length mismatch msg_id={}", header.msg_id));
            return None;
        }
        if !parsed.frame_crc_ok {
            self.metrics.rx_crc_fail += 1;
            log_debug(&format!("rx frame dropped: frame crc fail msg_id={}", header.msg_id));
            return None;
        }

        self.metrics.rx_frames += 1;
        log_debug(&format!(
            "rx frame accepted msg_id={} frag_idx={}/{} bytes={}",
            header.msg_id,
            header.frag_idx,
            header.frag_cnt,
            bytes.len()
        ));
        let on_air_payload = &bytes[parsed.payload_offset..expected_total];

        if header.flags.contains(FrameFlags::ACK) {
            let ack = AckBitmap::decode(on_air_payload)?;
            return Some(RxEvent::Ack(ack));
        }

        let plaintext = if header.flags.contains(FrameFlags::ENC) {
            match crypto::decrypt(&self.key_store, &header, on_air_payload) {
                Ok(pt) => pt,
                Err(_) => {
                    self.metrics.dec_fail_tag += 1;
                    return None;
                }
            }
        } else {
            on_air_payload.to_vec()
        };

        let (payload, _corrected) = match self.channel.decode(&plaintext, header.msg_id) {
            Some(v) => v,
            None => {
                self.metrics.dec_fail_other += 1;
                return None;
            }
        };

        let ack_required = header.flags.contains(FrameFlags::ACK_REQ);
        if !header.flags.contains(FrameFlags::FRAG) {
            self.deliver(header.msg_id, payload, ack_required)
        } else {
            self.handle_fragment(header.msg_id, header.frag_idx, header.frag_cnt, ack_required, now_ms, payload)
        }
    }

    fn gc(&mut self, now_ms: u64) {
        let expired: Vec<u32> = self
            .assemblers
            .iter()
            .filter(|(_, a)| now_ms.saturating_sub(a.first_seen_ms) > ASSEMBLER_TTL_MS)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(a) = self.assemblers.remove(&id) {
                self.assembler_bytes -= a.total_bytes;
                self.metrics.rx_assem_drop_ttl += 1;
            }
        }
        self.dup_window.trim();
    }

    /// Emit an ACK frame if the TDD scheduler is in the ACK phase and either
    /// an ACK-required fragment completed since the last emission or the
    /// aggregation timer has elapsed (spec §4.8 "ACK generation").
    pub fn take_ack_frame(&mut self, tdd: &TddScheduler, now_ms: u64) -> Option<Vec<u8>> {
        if !tdd.is_ack(now_ms) {
            return None;
        }
        let aggregation_elapsed = match self.last_ack_emit_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.config.ack_aggregation_ms as u64,
            None => true,
        };
        if !self.ack_dirty && !aggregation_elapsed {
            return None;
        }
        self.ack_dirty = false;
        self.last_ack_emit_ms = Some(now_ms);
        let formatter = PacketFormatter {
            key_store: &self.key_store,
            channel: &self.channel,
            config: &self.config,
        };
        Some(formatter.prepare_ack(&self.ack_bitmap))
    }
}
