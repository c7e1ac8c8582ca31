//! Corrupted frame handling (spec §8 scenario 5): a bit flip in a received
//! frame must be counted and silently dropped, never surfaced as an event.

use lora_link::cache::OutgoingMessage;
use lora_link::channel::{ChannelCodec, ChannelParams, FecMode, InterleaveDepth};
use lora_link::config::Qos;
use lora_link::formatter::PacketFormatter;
use lora_link::metrics::Metrics;
use lora_link::rx::RxPipeline;
use lora_link::LinkConfig;

fn off_channel() -> ChannelParams {
    ChannelParams {
        fec: FecMode::Off,
        interleave: InterleaveDepth::D1,
        pilot_interval_bytes: 64,
    }
}

#[test]
fn flipped_header_byte_is_dropped_and_counted() {
    let mut config = LinkConfig::default();
    config.header_dup = false; // isolate the corruption from the duplicate-copy recovery path
    let mut rx = RxPipeline::new(config.clone(), ChannelCodec::new(off_channel()));

    let msg = OutgoingMessage {
        id: 11,
        ack_required: true,
        qos: Qos::High,
        data: b"corrupt me".to_vec(),
    };
    let formatter = PacketFormatter {
        key_store: &rx.key_store,
        channel: &rx.channel,
        config: &rx.config,
    };
    let mut metrics = Metrics::new();
    let frames = formatter.prepare(&msg, &mut metrics);
    assert_eq!(frames.len(), 1);

    let mut wire = frames[0].on_air_bytes.clone();
    wire[2] ^= 0x01; // flip one bit inside the header

    let event = rx.on_receive(&wire, 0);
    assert!(event.is_none());
    assert_eq!(rx.metrics.rx_crc_fail, 1);
    assert_eq!(rx.metrics.rx_msgs_ok, 0);

    // The channel recovers cleanly on the next, uncorrupted frame.
    let ok_event = rx.on_receive(&frames[0].on_air_bytes, 1);
    assert!(ok_event.is_some());
    assert_eq!(rx.metrics.rx_msgs_ok, 1);
}

#[test]
fn flipped_payload_byte_fails_closed() {
    let config = LinkConfig::default();
    let mut rx = RxPipeline::new(config.clone(), ChannelCodec::new(off_channel()));

    let msg = OutgoingMessage {
        id: 12,
        ack_required: false,
        qos: Qos::Normal,
        data: b"another payload entirely".to_vec(),
    };
    let formatter = PacketFormatter {
        key_store: &rx.key_store,
        channel: &rx.channel,
        config: &rx.config,
    };
    let mut metrics = Metrics::new();
    let frames = formatter.prepare(&msg, &mut metrics);
    assert_eq!(frames.len(), 1);

    let mut wire = frames[0].on_air_bytes.clone();
    let last = wire.len() - 1;
    wire[last] ^= 0x80; // flip a bit in the trailing frame_crc field

    let event = rx.on_receive(&wire, 0);
    assert!(event.is_none());
    assert_eq!(rx.metrics.rx_crc_fail, 1);
}
