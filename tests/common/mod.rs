//! Shared loopback radio harness for cross-module integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use lora_link::config::Qos;
use lora_link::Radio;

/// Always accepts and queues frames for the peer to pick up.
pub struct LoopbackRadio {
    pub outbound: Rc<RefCell<VecDeque<Vec<u8>>>>,
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

/// Drops the first `drop_count` frames handed to it, then behaves like a
/// normal [`LoopbackRadio`] — simulates a channel that loses the initial
/// transmission(s) of a message.
pub struct LossyRadio {
    pub outbound: Rc<RefCell<VecDeque<Vec<u8>>>>,
    pub drop_remaining: Rc<RefCell<u32>>,
}

impl Radio for LossyRadio {
    fn send_raw(&mut self, bytes: &[u8], _qos: Qos) -> bool {
        let mut remaining = self.drop_remaining.borrow_mut();
        if *remaining > 0 {
            *remaining -= 1;
        } else {
            self.outbound.borrow_mut().push_back(bytes.to_vec());
        }
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
