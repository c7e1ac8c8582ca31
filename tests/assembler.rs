//! Assembler TTL expiry under partial delivery (spec §8 scenario 6): a
//! fragment arrives, the rest never does, and the assembler must be
//! reclaimed rather than leaking state forever.

use lora_link::channel::{ChannelCodec, ChannelParams, FecMode, InterleaveDepth};
use lora_link::cache::OutgoingMessage;
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
fn partial_message_is_reclaimed_after_ttl() {
    let config = LinkConfig::default();
    let mut rx = RxPipeline::new(config.clone(), ChannelCodec::new(off_channel()));

    let data: Vec<u8> = (0..600u32).map(|i| (i % 256) as u8).collect();
    let msg = OutgoingMessage {
        id: 42,
        ack_required: true,
        qos: Qos::High,
        data,
    };
    let formatter = PacketFormatter {
        key_store: &rx.key_store,
        channel: &rx.channel,
        config: &rx.config,
    };
    let mut metrics = Metrics::new();
    let frames = formatter.prepare(&msg, &mut metrics);
    assert!(frames.len() >= 3, "need a multi-fragment message for this scenario");

    // Only fragment 0 ever arrives.
    let delivered = rx.on_receive(&frames[0].on_air_bytes, 0);
    assert!(delivered.is_none());
    assert_eq!(rx.metrics.rx_assem_drop_ttl, 0);

    // 16s later, well past the 15s TTL: any subsequent call drives GC.
    let unrelated = rx.on_receive(&[0u8; 4], 16_000);
    assert!(unrelated.is_none());
    assert_eq!(rx.metrics.rx_assem_drop_ttl, 1);

    // The reclaimed assembler must not linger: a fresh message with the
    // same id can now be reassembled from scratch without interference
    // from the expired fragment.
    let fresh_data = vec![1, 2, 3];
    let fresh = OutgoingMessage {
        id: 42,
        ack_required: false,
        qos: Qos::Normal,
        data: fresh_data.clone(),
    };
    let formatter = PacketFormatter {
        key_store: &rx.key_store,
        channel: &rx.channel,
        config: &rx.config,
    };
    let mut metrics2 = Metrics::new();
    let fresh_frames = formatter.prepare(&fresh, &mut metrics2);
    assert_eq!(fresh_frames.len(), 1);
    let event = rx.on_receive(&fresh_frames[0].on_air_bytes, 16_001);
    assert_eq!(
        event,
        Some(lora_link::RxEvent::Message {
            msg_id: 42,
            data: fresh_data
        })
    );
}
