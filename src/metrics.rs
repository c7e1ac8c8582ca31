//! Counters and exponentially-weighted averages feeding the profile controller.
//!
//! Every failure path in the TX/RX pipelines increments exactly one counter
//! here instead of returning an error (see §7 of the design notes: nothing
//! is fatal, everything is counted).

/// Exponentially-weighted moving average, `alpha` in (0, 1].
#[derive(Debug, Clone, Copy)]
pub struct Ewma {
    alpha: f64,
    value: Option<f64>,
}

impl Ewma {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(v) => v + self.alpha * (sample - v),
            None => sample,
        };
        self.value = Some(next);
        next
    }

    pub fn get(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }
}

/// Link-wide counters, cheap to clone for snapshotting into a status report.
#[derive(Debug, Default, Clone)]
pub struct Metrics {
    pub tx_frames: u64,
    pub tx_bytes: u64,
    pub tx_retries: u64,
    pub ack_seen: u64,
    pub ack_fail: u64,
    pub enc_fail: u64,

    pub rx_frames: u64,
    pub rx_msgs_ok: u64,
    pub rx_drop_len_mismatch: u64,
    pub rx_crc_fail: u64,
    pub dec_fail_tag: u64,
    pub dec_fail_other: u64,
    pub rx_assem_drop_overflow: u64,
    pub rx_assem_drop_ttl: u64,
    pub rx_dup_msgs: u64,
    pub cache_reject: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Channel-quality EWMAs the profile controller reads each tick.
#[derive(Debug, Clone)]
pub struct ChannelEstimate {
    pub per: Ewma,
    pub ebn0_db: Ewma,
}

impl Default for ChannelEstimate {
    fn default() -> Self {
        Self {
            per: Ewma::new(0.25),
            ebn0_db: Ewma::new(0.25),
        }
    }
}

impl ChannelEstimate {
    pub fn record_packet(&mut self, lost: bool, ebn0_db: f64) {
        self.per.update(if lost { 1.0 } else { 0.0 });
        self.ebn0_db.update(ebn0_db);
    }
}
