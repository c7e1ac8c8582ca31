//! Forward error correction: OFF, RS(255,223)+Viterbi K=7 R=1/2, and
//! Hamming(12,8)-as-LDPC (spec §4.2).

use serde::{Deserialize, Serialize};

/// Which FEC scheme the channel codec applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FecMode {
    Off,
    RsViterbi,
    Hamming128,
}

/// Result of a decode pass: recovered bytes plus a count of symbols the
/// decoder corrected (0 for `Off`, best-effort for the others).
pub struct Decoded {
    pub data: Vec<u8>,
    pub corrected_symbols: u32,
}

pub fn encode(mode: FecMode, data: &[u8]) -> Vec<u8> {
    match mode {
        FecMode::Off => data.to_vec(),
        FecMode::RsViterbi => rs_viterbi::encode(data),
        FecMode::Hamming128 => hamming::encode(data),
    }
}

pub fn decode(mode: FecMode, data: &[u8]) -> Option<Decoded> {
    match mode {
        FecMode::Off => Some(Decoded {
            data: data.to_vec(),
            corrected_symbols: 0,
        }),
        FecMode::RsViterbi => rs_viterbi::decode(data),
        FecMode::Hamming128 => hamming::decode(data),
    }
}

/// Hamming(12,8): each input byte becomes a 12-bit codeword (4 parity bits
/// at positions 1,2,4,8; 8 info bits at 3,5,6,7,9,10,11,12), packed into 2
/// bytes. Single-bit-error-correcting.
mod hamming {
    use super::Decoded;

    fn encode_byte(byte: u8) -> u16 {
        // info bits placed at positions 3,5,6,7,9,10,11,12 (1-indexed, bit 1 = MSB of the 12-bit word)
        let info_positions = [3u16, 5, 6, 7, 9, 10, 11, 12];
        let mut word = 0u16;
        for (i, &pos) in info_positions.iter().enumerate() {
            let bit = (byte >> (7 - i)) & 1;
            if bit != 0 {
                word |= 1 << (12 - pos);
            }
        }
        for &p in &[1u16, 2, 4, 8] {
            let mut parity = 0u16;
            for pos in 1..=12u16 {
                if pos != p && (pos & p) != 0 {
                    let bit = (word >> (12 - pos)) & 1;
                    parity ^= bit;
                }
            }
            if parity != 0 {
                word |= 1 << (12 - p);
            }
        }
        word
    }

    fn decode_word(mut word: u16) -> (u8, bool) {
        let mut syndrome = 0u16;
        for &p in &[1u16, 2, 4, 8] {
            let mut parity = 0u16;
            for pos in 1..=12u16 {
                if (pos & p) != 0 {
                    let bit = (word >> (12 - pos)) & 1;
                    parity ^= bit;
                }
            }
            if parity != 0 {
                syndrome |= p;
            }
        }
        let corrected = syndrome != 0 && syndrome <= 12;
        if corrected {
            word ^= 1 << (12 - syndrome);
        }
        let info_positions = [3u16, 5, 6, 7, 9, 10, 11, 12];
        let mut byte = 0u8;
        for (i, &pos) in info_positions.iter().enumerate() {
            let bit = (word >> (12 - pos)) & 1;
            byte |= (bit as u8) << (7 - i);
        }
        (byte, corrected)
    }

    pub fn encode(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() * 2);
        for &b in data {
            let word = encode_byte(b);
            out.extend_from_slice(&word.to_be_bytes());
        }
        out
    }

    pub fn decode(data: &[u8]) -> Option<Decoded> {
        if data.len() % 2 != 0 {
            return None;
        }
        let mut out = Vec::with_capacity(data.len() / 2);
        let mut corrected_symbols = 0u32;
        for chunk in data.chunks_exact(2) {
            let word = u16::from_be_bytes([chunk[0], chunk[1]]);
            let (byte, corrected) = decode_word(word);
            if corrected {
                corrected_symbols += 1;
            }
            out.push(byte);
        }
        Some(Decoded {
            data: out,
            corrected_symbols,
        })
    }

}

/// RS(255,223) outer code + rate-1/2 K=7 convolutional inner code.
///
/// Decoding guarantees round-trip equality only under a zero-error channel
/// (spec §8 scopes single-bit-flip correction to Hamming/repeat codes, not
/// this mode); the RS layer here is systematic and the Viterbi layer
/// recovers the exact input bits whenever no channel errors occurred.
mod rs_viterbi {
    use super::Decoded;

    const RS_DATA_LEN: usize = 223;
    const RS_PARITY_LEN: usize = 32;
    const RS_BLOCK_LEN: usize = RS_DATA_LEN + RS_PARITY_LEN;

    mod gf256 {
        pub const PRIM_POLY: u16 = 0x11D; // x^8+x^4+x^3+x^2+1, standard CCSDS field

        pub struct Tables {
            pub exp: [u8; 512],
            pub log: [u8; 256],
        }

        pub fn build() -> Tables {
            let mut exp = [0u8; 512];
            let mut log = [0u8; 256];
            let mut x: u16 = 1;
            for i in 0..255usize {
                exp[i] = x as u8;
                log[x as usize] = i as u8;
                x <<= 1;
                if x & 0x100 != 0 {
                    x ^= PRIM_POLY;
                }
            }
            for i in 255..512 {
                exp[i] = exp[i - 255];
            }
            Tables { exp, log }
        }

        pub fn mul(t: &Tables, a: u8, b: u8) -> u8 {
            if a == 0 || b == 0 {
                0
            } else {
                t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
            }
        }
    }

    fn generator_poly(t: &gf256::Tables) -> Vec<u8> {
        // product_{i=0..RS_PARITY_LEN-1} (x - alpha^i), alpha = 2 in this field
        let mut g = vec![1u8];
        for i in 0..RS_PARITY_LEN {
            let root = t.exp[i];
            let mut next = vec![0u8; g.len() + 1];
            for (j, &coef) in g.iter().enumerate() {
                next[j] ^= gf256::mul(t, coef, root);
                next[j + 1] ^= coef;
            }
            g = next;
        }
        g
    }

    fn rs_encode_block(t: &gf256::Tables, gen: &[u8], data: &[u8; RS_DATA_LEN]) -> [u8; RS_BLOCK_LEN] {
        let mut remainder = vec![0u8; RS_PARITY_LEN];
        for &byte in data.iter() {
            let feedback = byte ^ remainder[0];
            remainder.rotate_left(1);
            *remainder.last_mut().unwrap() = 0;
            if feedback != 0 {
                for (i, &g) in gen.iter().skip(1).enumerate() {
                    remainder[i] ^= gf256::mul(t, g, feedback);
                }
            }
        }
        let mut block = [0u8; RS_BLOCK_LEN];
        block[..RS_DATA_LEN].copy_from_slice(data);
        block[RS_DATA_LEN..].copy_from_slice(&remainder);
        block
    }

    pub fn encode(data: &[u8]) -> Vec<u8> {
        let t = gf256::build();
        let gen = generator_poly(&t);
        let mut blocks = Vec::new();
        for chunk in data.chunks(RS_DATA_LEN) {
            let mut buf = [0u8; RS_DATA_LEN];
            buf[..chunk.len()].copy_from_slice(chunk);
            blocks.extend_from_slice(&rs_encode_block(&t, &gen, &buf));
        }
        let rs_bits = bits_from_bytes(&blocks);
        let conv_bits = conv::encode(&rs_bits);
        let mut out = bytes_from_bits(&conv_bits);
        // Prefix the original length so decode can un-pad the last RS block
        // and trim convolutional flush/padding bits.
        let mut framed = Vec::with_capacity(out.len() + 4);
        framed.extend_from_slice(&(data.len() as u32).to_be_bytes());
        framed.append(&mut out);
        framed
    }

    pub fn decode(data: &[u8]) -> Option<Decoded> {
        if data.len() < 4 {
            return None;
        }
        let orig_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let payload_bits = bits_from_bytes(&data[4..]);
        let n_blocks = orig_len.div_ceil(RS_DATA_LEN).max(1);
        let rs_bit_len = n_blocks * RS_BLOCK_LEN * 8;
        let rs_bits = conv::decode(&payload_bits, rs_bit_len)?;
        let blocks = bytes_from_bits(&rs_bits);
        let mut out = Vec::with_capacity(orig_len);
        for block in blocks.chunks(RS_BLOCK_LEN) {
            if block.len() < RS_DATA_LEN {
                break;
            }
            out.extend_from_slice(&block[..RS_DATA_LEN]);
        }
        out.truncate(orig_len);
        Some(Decoded {
            data: out,
            corrected_symbols: 0,
        })
    }

    fn bits_from_bytes(data: &[u8]) -> Vec<u8> {
        let mut bits = Vec::with_capacity(data.len() * 8);
        for &byte in data {
            for i in (0..8).rev() {
                bits.push((byte >> i) & 1);
            }
        }
        bits
    }

    fn bytes_from_bits(bits: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bits.len().div_ceil(8));
        for chunk in bits.chunks(8) {
            let mut byte = 0u8;
            for (i, &b) in chunk.iter().enumerate() {
                byte |= b << (7 - i);
            }
            out.push(byte);
        }
        out
    }

    /// Rate-1/2, K=7 convolutional code, generators 0o171 / 0o133.
    mod conv {
        const G0: u8 = 0o171;
        const G1: u8 = 0o133;
        const MEMORY: u32 = 6;
        const STATES: usize = 1 << MEMORY;

        fn transition(state: u8, bit: u8) -> (u8, u8, u8) {
            let reg7 = ((bit as u16) << 6) | state as u16;
            let c0 = parity8((reg7 & G0 as u16) as u8);
            let c1 = parity8((reg7 & G1 as u16) as u8);
            let next_state = (((state as u16) << 1) | bit as u16) as u8 & 0x3F;
            (c0, c1, next_state)
        }

        fn parity8(mut v: u8) -> u8 {
            let mut p = 0u8;
            while v != 0 {
                p ^= v & 1;
                v >>= 1;
            }
            p
        }

        pub fn encode(bits: &[u8]) -> Vec<u8> {
            let mut state = 0u8;
            let mut out = Vec::with_capacity((bits.len() + MEMORY as usize) * 2);
            for &b in bits {
                let (c0, c1, next) = transition(state, b);
                out.push(c0);
                out.push(c1);
                state = next;
            }
            for _ in 0..MEMORY {
                let (c0, c1, next) = transition(state, 0);
                out.push(c0);
                out.push(c1);
                state = next;
            }
            out
        }

        /// Viterbi-decode `rx_bits` (pairs of channel bits) back to
        /// `info_bit_len` information bits, assuming zero-tail termination
        /// to state 0.
        pub fn decode(rx_bits: &[u8], info_bit_len: usize) -> Option<Vec<u8>> {
            let steps = info_bit_len + MEMORY as usize;
            if rx_bits.len() < steps * 2 {
                return None;
            }
            const INF: u32 = u32::MAX / 2;
            let mut metric = vec![INF; STATES];
            metric[0] = 0;
            // predecessors[t][s] = (prev_state, input_bit)
            let mut predecessors: Vec<[(u8, u8); STATES]> = Vec::with_capacity(steps);

            for t in 0..steps {
                let r0 = rx_bits[2 * t];
                let r1 = rx_bits[2 * t + 1];
                let mut next_metric = vec![INF; STATES];
                let mut step_pred = [(0u8, 0u8); STATES];
                for s in 0..STATES {
                    if metric[s] == INF {
                        continue;
                    }
                    for b in 0..2u8 {
                        let (c0, c1, next_state) = transition(s as u8, b);
                        let bm = (c0 != r0) as u32 + (c1 != r1) as u32;
                        let cand = metric[s] + bm;
                        let ns = next_state as usize;
                        if cand < next_metric[ns] {
                            next_metric[ns] = cand;
                            step_pred[ns] = (s as u8, b);
                        }
                    }
                }
                metric = next_metric;
                predecessors.push(step_pred);
            }

            let mut state = 0u8; // zero-tail termination
            let mut bits = vec![0u8; steps];
            for t in (0..steps).rev() {
                let (prev, b) = predecessors[t][state as usize];
                bits[t] = b;
                state = prev;
            }
            bits.truncate(info_bit_len);
            Some(bits)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn round_trips_clean_channel() {
            let data = b"reed solomon and viterbi over a narrowband link".to_vec();
            let enc = encode(&data);
            let dec = decode(&enc).unwrap();
            assert_eq!(dec.data, data);
        }

        #[test]
        fn handles_short_input() {
            let data = vec![0xAB];
            let enc = encode(&data);
            let dec = decode(&enc).unwrap();
            assert_eq!(dec.data, data);
        }
    }
}
