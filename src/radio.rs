//! External radio driver contract (spec §6). The engine only ever holds a
//! `&mut dyn Radio` / `Arc<Mutex<dyn Radio>>` — it never owns hardware.

use crate::config::Qos;

/// Byte-level radio driver interface consumed by the TX/RX pipelines.
///
/// Implementations MUST NOT transmit outside the TX phase; the TDD
/// scheduler (§4.9) is responsible for gating calls into `send_raw`, not
/// this trait.
pub trait Radio {
    /// Transmit `bytes` exactly as given. Returns `false` if the driver
    /// could not accept the frame (e.g. still busy).
    fn send_raw(&mut self, bytes: &[u8], qos: Qos) -> bool;

    /// Place the receiver in listen mode for at least `window_ticks`.
    fn force_rx(&mut self, window_ticks: u32);

    fn set_frequency(&mut self, hz: u64);
    fn set_bandwidth(&mut self, khz: u32);
    fn set_spreading_factor(&mut self, sf: u8);
    fn set_coding_rate(&mut self, cr4x: u8);
    fn set_tx_power(&mut self, dbm: i8);

    fn get_snr(&self) -> f64;
    fn get_ebn0(&self) -> f64;
    fn get_rssi(&self) -> f64;
}
