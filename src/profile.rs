//! Link-profile controller: adapts bandwidth/SF/CR/FEC/interleave from
//! EWMA-smoothed PER and Eb/N0 (spec §4.6).

use crate::config::LinkProfile;
use crate::logging::log_info;
use crate::metrics::ChannelEstimate;
use crate::radio::Radio;

pub struct ProfileController {
    estimate: ChannelEstimate,
    current: LinkProfile,
}

impl ProfileController {
    pub fn new(initial: LinkProfile) -> Self {
        Self {
            estimate: ChannelEstimate::default(),
            current: initial,
        }
    }

    pub fn current(&self) -> LinkProfile {
        self.current
    }

    /// Record a packet outcome (lost on ARQ exhaustion / acked otherwise).
    pub fn observe(&mut self, lost: bool, ebn0_db: f64) {
        self.estimate.record_packet(lost, ebn0_db);
    }

    /// Re-evaluate the profile against current EWMAs. If it changed, pushes
    /// the new radio parameters atomically (bandwidth/SF/CR, before the
    /// next TX) and returns the new profile.
    pub fn tick(&mut self, radio: &mut dyn Radio) -> Option<LinkProfile> {
        let per = self.estimate.per.get();
        let ebn0 = self.estimate.ebn0_db.get();
        let selected = LinkProfile::select(per, ebn0);
        if selected == self.current {
            return None;
        }
        log_info(&format!(
            "profile change {:?} -> {:?} (per={per:.3} ebn0={ebn0:.1}dB)",
            self.current, selected
        ));
        self.current = selected;
        let params = selected.params();
        radio.set_bandwidth(params.bandwidth_khz);
        radio.set_spreading_factor(params.spreading_factor);
        radio.set_coding_rate(params.coding_rate_4x);
        Some(selected)
    }
}
