//! Loopback demonstration of the link engine: two in-process nodes talk
//! over an in-memory "ether" instead of real radio hardware (spec §10.5).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use clap::Parser;

use lora_link::channel::{ChannelCodec, ChannelParams, FecMode, InterleaveDepth};
use lora_link::config::Qos;
use lora_link::rx::{RxEvent, RxPipeline};
use lora_link::tx::TxPipeline;
use lora_link::logging::{init_logger, log_info};
use lora_link::{LinkConfig, Radio, TddScheduler};

#[derive(Parser)]
#[command(name = "linksim")]
#[command(about = "Loopback demo of the link engine's TX/RX pipelines")]
struct Cli {
    /// Message bytes to send, as a UTF-8 string.
    #[arg(short, long, default_value = "hello over the air")]
    message: String,

    /// Require an ACK for the message.
    #[arg(long, default_value_t = true)]
    ack: bool,

    /// Forward error correction mode.
    #[arg(long, value_enum, default_value_t = FecArg::Off)]
    fec: FecArg,

    /// Matrix interleave depth (1, 4, 8, or 16).
    #[arg(long, default_value_t = 1)]
    interleave: u8,

    /// 16-byte AES-CCM key as hex; enables encryption when given.
    #[arg(long)]
    key: Option<String>,

    /// Maximum simulated ticks before giving up.
    #[arg(long, default_value_t = 10_000)]
    ticks: u64,

    /// Milliseconds advanced per simulated tick.
    #[arg(long, default_value_t = 10)]
    step_ms: u64,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum FecArg {
    Off,
    Hamming,
    RsViterbi,
}

impl From<FecArg> for FecMode {
    fn from(value: FecArg) -> Self {
        match value {
            FecArg::Off => FecMode::Off,
            FecArg::Hamming => FecMode::Hamming128,
            FecArg::RsViterbi => FecMode::RsViterbi,
        }
    }
}

struct LoopbackRadio {
    outbound: Rc<RefCell<VecDeque<Vec<u8>>>>,
}

impl Radio for LoopbackRadio {
    fn send_raw(&mut self, bytes: &[u8], _qos: Qos) -> bool {
        self.outbound.borrow_mut().push_back(bytes.to_vec());
        true
    }
    fn force_rx(&mut self, _window_ticks: u32) {}
    fn set_frequency(&mut self, _hz: u64) {}
    fn set_bandwidth(&mut self, _khz: u32) {}
    fn set_spreading_factor(&mut self, _sf: u8) {}
    fn set_coding_rate(&mut self, _cr4x: u8) {}
    fn set_tx_power(&mut self, _dbm: i8) {}
    fn get_snr(&self) -> f64 {
        12.0
    }
    fn get_ebn0(&self) -> f64 {
        10.0
    }
    fn get_rssi(&self) -> f64 {
        -70.0
    }
}

fn main() {
    init_logger();
    let cli = Cli::parse();

    let interleave = InterleaveDepth::clamp(cli.interleave);
    let channel_params = ChannelParams {
        fec: cli.fec.into(),
        interleave,
        pilot_interval_bytes: 64,
    };

    let mut config = LinkConfig::default();
    config.header_dup = true;
    if cli.key.is_some() {
        config.encryption_enabled = true;
    }

    let mut tx = TxPipeline::new(config.clone(), ChannelCodec::new(channel_params));
    let mut rx_b = RxPipeline::new(config.clone(), ChannelCodec::new(channel_params));
    let mut rx_a = RxPipeline::new(config.clone(), ChannelCodec::new(channel_params));

    if let Some(hex_key) = &cli.key {
        let bytes = hex::decode(hex_key).expect("key must be valid hex");
        tx.key_store.set_key(1, &bytes).expect("16-byte key");
        tx.key_store.set_active_kid(1).expect("kid 1 present");
        rx_b.key_store.set_key(1, &bytes).expect("16-byte key");
    }

    let id = tx.enqueue(cli.message.clone().into_bytes(), cli.ack, Qos::High);
    if id == 0 {
        eprintln!("cache rejected the message (capacity exceeded)");
        std::process::exit(1);
    }
    log_info(&format!("enqueued msg_id={id} len={}", cli.message.len()));

    let tdd = TddScheduler::new(0);
    let a_to_b = Rc::new(RefCell::new(VecDeque::new()));
    let b_to_a = Rc::new(RefCell::new(VecDeque::new()));

    for t in 0..cli.ticks {
        let now_ms = t * cli.step_ms;

        let mut radio_a_out = LoopbackRadio {
            outbound: a_to_b.clone(),
        };
        tx.tick(now_ms, &tdd, &mut radio_a_out);

        while let Some(bytes) = a_to_b.borrow_mut().pop_front() {
            if let Some(RxEvent::Message { msg_id, data }) = rx_b.on_receive(&bytes, now_ms) {
                println!("delivered msg_id={msg_id}: {}", String::from_utf8_lossy(&data));
            }
        }

        if let Some(ack_bytes) = rx_b.take_ack_frame(&tdd, now_ms) {
            b_to_a.borrow_mut().push_back(ack_bytes);
        }

        while let Some(bytes) = b_to_a.borrow_mut().pop_front() {
            if let Some(RxEvent::Ack(ack)) = rx_a.on_receive(&bytes, now_ms) {
                tx.on_ack(ack);
            }
        }

        if tx.cache.is_message_queue_empty() && tx.pending_count() == 0 {
            break;
        }
    }

    println!(
        "metrics: tx_frames={} tx_retries={} ack_seen={} rx_msgs_ok={}",
        tx.metrics.tx_frames, tx.metrics.tx_retries, tx.metrics.ack_seen, rx_b.metrics.rx_msgs_ok
    );
}
