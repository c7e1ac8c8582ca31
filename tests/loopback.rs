//! End-to-end TX -> RX loopback scenarios over a lossless channel.

mod common;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use lora_link::channel::{ChannelCodec, ChannelParams, FecMode, InterleaveDepth};
use lora_link::config::Qos;
use lora_link::rx::{RxEvent, RxPipeline};
use lora_link::tx::TxPipeline;
use lora_link::{LinkConfig, TddScheduler};

use common::LoopbackRadio;

struct Harness {
    tx: TxPipeline,
    rx_a: RxPipeline,
    rx_b: RxPipeline,
    tdd: TddScheduler,
    a_to_b: Rc<RefCell<VecDeque<Vec<u8>>>>,
    b_to_a: Rc<RefCell<VecDeque<Vec<u8>>>>,
}

impl Harness {
    fn new(config: LinkConfig, params: ChannelParams) -> Self {
        Self {
            tx: TxPipeline::new(config.clone(), ChannelCodec::new(params)),
            rx_a: RxPipeline::new(config.clone(), ChannelCodec::new(params)),
            rx_b: RxPipeline::new(config, ChannelCodec::new(params)),
            tdd: TddScheduler::new(0),
            a_to_b: Rc::new(RefCell::new(VecDeque::new())),
            b_to_a: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Runs ticks until the message queue drains or `max_ticks` elapses.
    /// Returns every message delivered by node B's RX pipeline along the way.
    fn run(&mut self, step_ms: u64, max_ticks: u64) -> Vec<(u32, Vec<u8>)> {
        let mut delivered = Vec::new();
        for t in 0..max_ticks {
            let now_ms = t * step_ms;

            let mut radio_out = LoopbackRadio {
                outbound: self.a_to_b.clone(),
            };
            self.tx.tick(now_ms, &self.tdd, &mut radio_out);

            while let Some(bytes) = self.a_to_b.borrow_mut().pop_front() {
                if let Some(RxEvent::Message { msg_id, data }) = self.rx_b.on_receive(&bytes, now_ms) {
                    delivered.push((msg_id, data));
                }
            }

            if let Some(ack_bytes) = self.rx_b.take_ack_frame(&self.tdd, now_ms) {
                self.b_to_a.borrow_mut().push_back(ack_bytes);
            }

            while let Some(bytes) = self.b_to_a.borrow_mut().pop_front() {
                if let Some(RxEvent::Ack(ack)) = self.rx_a.on_receive(&bytes, now_ms) {
                    self.tx.on_ack(ack);
                }
            }

            if self.tx.cache.is_message_queue_empty() && self.tx.pending_count() == 0 {
                break;
            }
        }
        delivered
    }
}

fn off_channel() -> ChannelParams {
    ChannelParams {
        fec: FecMode::Off,
        interleave: InterleaveDepth::D1,
        pilot_interval_bytes: 64,
    }
}

#[test]
fn single_small_message_ack_on_no_loss() {
    let mut h = Harness::new(LinkConfig::default(), off_channel());
    let id = h.tx.enqueue(vec![1, 2, 3, 4, 5], true, Qos::High);
    assert!(id > 0);

    let delivered = h.run(10, 2000);
    assert_eq!(delivered, vec![(id, vec![1, 2, 3, 4, 5])]);
    assert_eq!(h.tx.metrics.ack_seen, 1);
    assert!(h.tx.cache.is_message_queue_empty());
    assert_eq!(h.tx.pending_count(), 0);
}

#[test]
fn fragmented_message_with_aead_delivers_whole_payload() {
    let mut config = LinkConfig::default();
    config.encryption_enabled = true;
    let mut h = Harness::new(config, off_channel());

    let key = [0x11u8; 16];
    h.tx.key_store.set_key(1, &key).unwrap();
    h.tx.key_store.set_active_kid(1).unwrap();
    h.rx_b.key_store.set_key(1, &key).unwrap();

    let data: Vec<u8> = (0..600u32).map(|i| (i % 256) as u8).collect();
    let id = h.tx.enqueue(data.clone(), true, Qos::High);

    let delivered = h.run(10, 4000);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0], (id, data));
    assert_eq!(h.tx.metrics.ack_seen, 1);
}
