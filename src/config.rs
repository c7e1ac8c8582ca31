//! Serializable link tuning, round-tripping through `serde_json` so a host
//! application can persist and restore it without this crate knowing how
//! persistence works (the persistent settings store itself is an external
//! concern, see spec §1).

use serde::{Deserialize, Serialize};

use crate::channel::{FecMode, InterleaveDepth};
use crate::error::{LinkError, Result};

/// Message priority class. Three fixed classes, matching the three cache FIFOs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Qos {
    High,
    Normal,
    Low,
}

impl Qos {
    pub const ALL: [Qos; 3] = [Qos::High, Qos::Normal, Qos::Low];
}

/// How the cache chooses among the three QoS queues on `peek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    /// Always drain High before Normal before Low.
    Strict,
    /// Round-robin over the 7-slot pattern `[H,H,H,H,N,N,L]`.
    Weighted421,
}

/// Adaptive link profile, increasing robustness from P0 to P3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkProfile {
    P0,
    P1,
    P2,
    P3,
}

/// Concrete radio/channel-coding parameters a [`LinkProfile`] maps to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileParams {
    pub bandwidth_khz: u32,
    pub spreading_factor: u8,
    pub coding_rate_4x: u8,
    pub fec: FecMode,
    pub interleave: InterleaveDepth,
}

impl LinkProfile {
    /// (bandwidth, SF, CR, FEC, interleave) tuple for this profile.
    pub fn params(self) -> ProfileParams {
        match self {
            LinkProfile::P0 => ProfileParams {
                bandwidth_khz: 500,
                spreading_factor: 7,
                coding_rate_4x: 5,
                fec: FecMode::Off,
                interleave: InterleaveDepth::D1,
            },
            LinkProfile::P1 => ProfileParams {
                bandwidth_khz: 250,
                spreading_factor: 8,
                coding_rate_4x: 6,
                fec: FecMode::Hamming128,
                interleave: InterleaveDepth::D4,
            },
            LinkProfile::P2 => ProfileParams {
                bandwidth_khz: 125,
                spreading_factor: 10,
                coding_rate_4x: 7,
                fec: FecMode::RsViterbi,
                interleave: InterleaveDepth::D8,
            },
            LinkProfile::P3 => ProfileParams {
                bandwidth_khz: 125,
                spreading_factor: 12,
                coding_rate_4x: 8,
                fec: FecMode::RsViterbi,
                interleave: InterleaveDepth::D16,
            },
        }
    }

    /// Pick the profile for a (PER, Eb/N0) sample using the hysteretic
    /// thresholds of spec §4.6.
    pub fn select(per: f64, ebn0_db: f64) -> LinkProfile {
        if per < 0.10 && ebn0_db >= 8.0 {
            LinkProfile::P0
        } else if (0.10..0.20).contains(&per) || (5.0..8.0).contains(&ebn0_db) {
            LinkProfile::P1
        } else if (0.20..0.30).contains(&per) || (3.0..5.0).contains(&ebn0_db) {
            LinkProfile::P2
        } else {
            LinkProfile::P3
        }
    }
}

/// Every tunable named in spec §6 "Defaults", plus scheduling policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub ack_required_default: bool,
    pub encryption_enabled: bool,
    pub header_dup: bool,
    pub window: u8,
    pub burst_limit: u8,
    pub pilot_interval_bytes: u16,
    pub ack_timeout_ms: u32,
    pub ack_timeout_cap_ms: u32,
    pub max_retries: u8,
    pub ack_aggregation_ms: u32,
    pub inter_frame_gap_ms: u32,
    pub mtu: u16,
    pub profile: LinkProfile,
    pub scheduling: SchedulingPolicy,
    /// Number of identical on-air copies emitted per prepared frame
    /// (spec §4.7). `1` sends each frame once.
    pub repeat_count: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ack_required_default: false,
            encryption_enabled: false,
            header_dup: true,
            window: 8,
            burst_limit: 8,
            pilot_interval_bytes: 64,
            ack_timeout_ms: 1200,
            ack_timeout_cap_ms: 5000,
            max_retries: 3,
            ack_aggregation_ms: 50,
            inter_frame_gap_ms: 25,
            mtu: 255,
            profile: LinkProfile::P0,
            scheduling: SchedulingPolicy::Weighted421,
            repeat_count: 1,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<()> {
        if (self.mtu as usize) < crate::frame::HEADER_LEN + 1 {
            return Err(LinkError::MtuTooSmall(self.mtu));
        }
        if self.window == 0 {
            return Err(LinkError::InvalidWindow(self.window));
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
