//! Packet formatter: turns one outgoing message into ordered on-air frames
//! (spec §4.7): fragment → AEAD → channel-code → dual-CRC header → framing.
//!
//! Implementation note (see DESIGN.md): the AEAD nonce/AAD header and the
//! final wire header necessarily differ in `payload_len` — the nonce is
//! derived before channel coding inflates the fragment, so it carries the
//! plaintext fragment length, while the wire header carries the final
//! on-air length used for framing and `frame_crc`. Both headers otherwise
//! share identical fields.

use crate::ack::AckBitmap;
use crate::cache::OutgoingMessage;
use crate::channel::ChannelCodec;
use crate::config::LinkConfig;
use crate::crypto::{self, KeyStore};
use crate::frame::{self, FrameFlags, FrameHeader};
use crate::fragment;
use crate::metrics::Metrics;

pub const AEAD_OVERHEAD_BYTES: usize = 1 + 8; // KID byte + 8-byte tag

pub struct PreparedFrame {
    pub header: FrameHeader,
    pub on_air_bytes: Vec<u8>,
    pub ack_required: bool,
}

pub struct PacketFormatter<'a> {
    pub key_store: &'a KeyStore,
    pub channel: &'a ChannelCodec,
    pub config: &'a LinkConfig,
}

impl<'a> PacketFormatter<'a> {
    fn effective_payload_cap(&self) -> usize {
        let overhead = frame::HEADER_LEN + if self.config.encryption_enabled {
            AEAD_OVERHEAD_BYTES
        } else {
            0
        };
        (self.config.mtu as usize).saturating_sub(overhead)
    }

    /// Build every on-air frame for `msg`, skipping fragments whose AEAD
    /// step fails (counted as `enc_fail`, spec §7 — the message still
    /// advances, it does not abort). Returns all frames, each duplicated
    /// `config.repeat_count` times (spec §4.7).
    pub fn prepare(&self, msg: &OutgoingMessage, metrics: &mut Metrics) -> Vec<PreparedFrame> {
        let cap = self.effective_payload_cap().max(1);
        let frags = fragment::fragment(msg.id, &msg.data, msg.ack_required, cap);
        let mut out = Vec::with_capacity(frags.len());
        for frag in frags {
            let mut flags = frag.flags;
            if self.config.encryption_enabled {
                flags |= FrameFlags::ENC;
            }

            let nonce_header =
                FrameHeader::new(flags, frag.msg_id, frag.frag_idx, frag.frag_cnt, frag.payload.len() as u16);

            let coded_input = if self.config.encryption_enabled {
                match crypto::encrypt(self.key_store, &nonce_header, &frag.payload) {
                    Some(ct) => ct,
                    None => {
                        metrics.enc_fail += 1;
                        continue;
                    }
                }
            } else {
                frag.payload
            };

            let on_air_payload = self.channel.encode(&coded_input, frag.msg_id);
            let final_header = FrameHeader::new(
                flags,
                frag.msg_id,
                frag.frag_idx,
                frag.frag_cnt,
                on_air_payload.len() as u16,
            );
            let on_air_bytes = frame::build_frame(&final_header, &on_air_payload, self.config.header_dup);
            let ack_required = flags.contains(FrameFlags::ACK_REQ);
            for _ in 0..self.config.repeat_count.max(1) {
                out.push(PreparedFrame {
                    header: final_header,
                    on_air_bytes: on_air_bytes.clone(),
                    ack_required,
                });
            }
        }
        out
    }

    /// Build the on-air bytes for an ACK frame carrying `ack`.
    pub fn prepare_ack(&self, ack: &AckBitmap) -> Vec<u8> {
        let header = FrameHeader::new(FrameFlags::ACK, ack.highest, 0, 0, crate::ack::ACK_PAYLOAD_LEN as u16);
        frame::build_frame(&header, &ack.encode(), self.config.header_dup)
    }
}
