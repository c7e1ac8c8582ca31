//! Half-duplex TDD link-layer engine: fragmentation, AEAD, CCSDS-style
//! channel coding and selective-repeat ARQ over a LoRa-class narrowband
//! radio.
//!
//! The engine owns no hardware. Callers provide a [`radio::Radio`]
//! implementation and drive [`tx::TxPipeline::tick`] from a cooperative
//! event loop, feeding demodulated bytes into [`rx::RxPipeline::on_receive`]
//! from whatever context the radio driver calls back on.

pub mod ack;
pub mod cache;
pub mod channel;
pub mod config;
pub mod crypto;
pub mod error;
pub mod formatter;
pub mod fragment;
pub mod frame;
pub mod logging;
pub mod metrics;
pub mod profile;
pub mod radio;
pub mod rx;
pub mod tdd;
pub mod tx;

pub use config::{LinkConfig, LinkProfile, Qos, SchedulingPolicy};
pub use error::{LinkError, Result};
pub use radio::Radio;
pub use rx::{RxEvent, RxPipeline};
pub use tdd::{Phase, TddScheduler};
pub use tx::TxPipeline;
