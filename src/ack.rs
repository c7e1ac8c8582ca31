//! Cumulative ACK bitmap: 8-byte payload, `highest` (4B) ‖ `bitmap` (4B)
//! where bit *k* set means `highest - (k+1)` is acknowledged (spec §3).

pub const ACK_PAYLOAD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckBitmap {
    pub highest: u32,
    pub bitmap: u32,
}

impl AckBitmap {
    pub fn encode(&self) -> [u8; ACK_PAYLOAD_LEN] {
        let mut out = [0u8; ACK_PAYLOAD_LEN];
        out[0..4].copy_from_slice(&self.highest.to_be_bytes());
        out[4..8].copy_from_slice(&self.bitmap.to_be_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < ACK_PAYLOAD_LEN {
            return None;
        }
        Some(Self {
            highest: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            bitmap: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// All msg_ids this ACK covers: `{highest} ∪ {highest-(k+1) : bit k set}`.
    /// Ids that would underflow (`highest < k+1`) are skipped.
    pub fn acknowledged_ids(&self) -> Vec<u32> {
        let mut ids = vec![self.highest];
        for k in 0..32u32 {
            if self.bitmap & (1 << k) != 0 {
                if let Some(id) = self.highest.checked_sub(k + 1) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Record that `msg_id` completed, updating `highest`/`bitmap`
    /// idempotently (spec §4.8 "ACK generation").
    pub fn record_completed(&mut self, msg_id: u32) {
        if msg_id > self.highest {
            let shift = msg_id - self.highest;
            self.bitmap = if shift >= 32 {
                0
            } else {
                (self.bitmap << shift) | (1 << (shift - 1))
            };
            self.highest = msg_id;
        } else if msg_id < self.highest {
            let k = self.highest - msg_id - 1;
            if k < 32 {
                self.bitmap |= 1 << k;
            }
        }
        // msg_id == highest: already covered, idempotent no-op.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let ack = AckBitmap {
            highest: 100,
            bitmap: 0b101,
        };
        let enc = ack.encode();
        let dec = AckBitmap::decode(&enc).unwrap();
        assert_eq!(ack, dec);
    }

    #[test]
    fn acknowledged_ids_match_spec_formula() {
        let ack = AckBitmap {
            highest: 10,
            bitmap: 0b101, // bits 0 and 2 set -> 10-1=9, 10-3=7
        };
        let mut ids = ack.acknowledged_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![7, 9, 10]);
    }

    #[test]
    fn record_completed_is_idempotent() {
        let mut ack = AckBitmap::default();
        ack.record_completed(5);
        let after_first = ack;
        ack.record_completed(5);
        assert_eq!(ack, after_first);
    }

    #[test]
    fn record_completed_builds_cumulative_bitmap() {
        let mut ack = AckBitmap::default();
        ack.record_completed(3);
        ack.record_completed(5);
        // highest=5; msg 3 is 5-(k+1) => k=1
        assert_eq!(ack.highest, 5);
        assert!(ack.bitmap & (1 << 1) != 0);
    }
}
