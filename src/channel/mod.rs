//! CCSDS-style channel codec: ASM ‖ scramble ‖ FEC ‖ interleave ‖ pilots
//! (spec §4.2). The ASM is prefixed to the cleartext before scrambling and
//! rides inside the scrambled block, not as a cleartext prefix on the wire.
//! Canonical variant per SPEC_FULL §9: interleave depth clamped to
//! `{1,4,8,16}`.

pub mod fec;
pub mod interleaver;
pub mod pilot;
pub mod scrambler;

pub use fec::FecMode;
pub use interleaver::InterleaveDepth;

/// 4-byte attached sync marker prefixed to the block before scrambling.
pub const ASM: [u8; 4] = [0x1A, 0xCF, 0xFC, 0x1D];

#[derive(Debug, Clone, Copy)]
pub struct ChannelParams {
    pub fec: FecMode,
    pub interleave: InterleaveDepth,
    pub pilot_interval_bytes: u16,
}

pub struct ChannelCodec {
    pub params: ChannelParams,
}

impl ChannelCodec {
    pub fn new(params: ChannelParams) -> Self {
        Self { params }
    }

    /// Encode `plaintext` for `msg_id` into an on-air byte sequence:
    /// scramble(ASM ‖ plaintext) ‖ FEC ‖ interleave ‖ pilots.
    pub fn encode(&self, plaintext: &[u8], msg_id: u32) -> Vec<u8> {
        let mut marked = Vec::with_capacity(ASM.len() + plaintext.len());
        marked.extend_from_slice(&ASM);
        marked.extend_from_slice(plaintext);
        let seed = scrambler::seed_from_msg_id(msg_id);
        let scrambled = scrambler::scramble(&marked, seed);
        let fec_encoded = fec::encode(self.params.fec, &scrambled);
        let interleaved = interleaver::interleave(&fec_encoded, self.params.interleave);
        pilot::insert(&interleaved, self.params.pilot_interval_bytes)
    }

    /// Invert [`Self::encode`]. Returns `(plaintext, corrected_symbols)`,
    /// or `None` if the ASM doesn't match after descrambling or the
    /// pipeline desyncs.
    pub fn decode(&self, on_air: &[u8], msg_id: u32) -> Option<(Vec<u8>, u32)> {
        let interleaved = pilot::remove(on_air, self.params.pilot_interval_bytes)?;
        let fec_encoded = interleaver::deinterleave(&interleaved, self.params.interleave);
        let decoded = fec::decode(self.params.fec, &fec_encoded)?;
        let seed = scrambler::seed_from_msg_id(msg_id);
        let marked = scrambler::scramble(&decoded.data, seed);
        if marked.len() < ASM.len() || marked[..ASM.len()] != ASM {
            return None;
        }
        Some((marked[ASM.len()..].to_vec(), decoded.corrected_symbols))
    }
}
