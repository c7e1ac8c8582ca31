//! On-air frame header: 14 bytes, big-endian, dual CRC-CCITT (spec §3, §4.1).
//!
//! Wire layout (extended header, canonical per SPEC_FULL §9 — see DESIGN.md
//! for why this reconciles the spec's "14-byte header" framing with its
//! "dual CRC ... stored in the last 4 bytes" framing):
//!
//! ```text
//! offset  0    1      2..6    6..8      8..10     10..12       12..14
//!        ver  flags  msg_id  frag_idx  frag_cnt  payload_len   hdr_crc
//! ```
//! That's the 14-byte header proper; `hdr_crc` covers bytes `0..10`. A
//! second field, `frame_crc` (2 bytes, CRC-CCITT over the full 14-byte
//! header ‖ payload with `frame_crc` conceptually zero), is carried
//! immediately after the header on the wire — so "the last 4 bytes" of the
//! combined preamble are `hdr_crc ‖ frame_crc`, exactly as the source
//! describes, without changing the header's own 14-byte width.

use bitflags::bitflags;

pub const HEADER_LEN: usize = 14;
pub const PROTOCOL_VERSION: u8 = 1;

bitflags! {
    /// Header flag bits. Bit positions are part of the wire format and must
    /// never be renumbered (spec §9).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        const ACK_REQ = 0x01;
        const ACK     = 0x02;
        const ENC     = 0x04;
        const FRAG    = 0x08;
        const LAST    = 0x10;
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub ver: u8,
    pub flags: FrameFlags,
    pub msg_id: u32,
    pub frag_idx: u16,
    pub frag_cnt: u16,
    pub payload_len: u16,
}

impl FrameHeader {
    pub fn new(flags: FrameFlags, msg_id: u32, frag_idx: u16, frag_cnt: u16, payload_len: u16) -> Self {
        Self {
            ver: PROTOCOL_VERSION,
            flags,
            msg_id,
            frag_idx,
            frag_cnt,
            payload_len,
        }
    }

    fn write_fields(&self, out: &mut [u8; HEADER_LEN]) {
        out[0] = self.ver;
        out[1] = self.flags.bits();
        out[2..6].copy_from_slice(&self.msg_id.to_be_bytes());
        out[6..8].copy_from_slice(&self.frag_idx.to_be_bytes());
        out[8..10].copy_from_slice(&self.frag_cnt.to_be_bytes());
        out[10..12].copy_from_slice(&self.payload_len.to_be_bytes());
        out[12] = 0;
        out[13] = 0;
    }

    /// Encode the 14-byte header with `hdr_crc` computed over bytes `0..10`.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        self.write_fields(&mut buf);
        let hdr_crc = crc16_ccitt(&buf[0..10]);
        buf[12..14].copy_from_slice(&hdr_crc.to_be_bytes());
        buf
    }

    /// Encode the header with `hdr_crc` left at zero — the AEAD AAD form
    /// (AAD is "the encoded header with both CRC fields zeroed", §4.3).
    pub fn encode_zero_crc(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        self.write_fields(&mut buf);
        buf
    }

    /// Decode a header from the first 14 bytes of `buf`, checking `hdr_crc`.
    ///
    /// Returns `None` on: short buffer, version mismatch, or header CRC
    /// failure. Callers count whichever applies (spec §4.1, §4.8 steps 1-3).
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let ver = buf[0];
        if ver != PROTOCOL_VERSION {
            return None;
        }
        let got_hdr_crc = u16::from_be_bytes([buf[12], buf[13]]);
        let want_hdr_crc = crc16_ccitt(&buf[0..10]);
        if got_hdr_crc != want_hdr_crc {
            return None;
        }
        let flags = FrameFlags::from_bits_truncate(buf[1]);
        let msg_id = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        let frag_idx = u16::from_be_bytes([buf[6], buf[7]]);
        let frag_cnt = u16::from_be_bytes([buf[8], buf[9]]);
        let payload_len = u16::from_be_bytes([buf[10], buf[11]]);
        Some(Self {
            ver,
            flags,
            msg_id,
            frag_idx,
            frag_cnt,
            payload_len,
        })
    }
}

/// Compute `frame_crc` over `header ‖ payload`, where `header` is the
/// already-`hdr_crc`-filled 14-byte encoding.
pub fn frame_crc(header: &[u8; HEADER_LEN], payload: &[u8]) -> u16 {
    let crc = crc16_ccitt(header);
    crc16_ccitt_continue(crc, payload)
}

/// Width, in bytes, of the on-air preamble for one header copy:
/// 14-byte header + 2-byte trailing `frame_crc`.
pub const FRAMED_HEADER_LEN: usize = HEADER_LEN + 2;

/// Build a complete on-air frame: `header ‖ frame_crc ‖ (dup)? ‖ payload`.
pub fn build_frame(header: &FrameHeader, payload: &[u8], header_dup: bool) -> Vec<u8> {
    let hdr = header.encode();
    let fcrc = frame_crc(&hdr, payload);
    let copies = if header_dup { 2 } else { 1 };
    let mut out = Vec::with_capacity(FRAMED_HEADER_LEN * copies + payload.len());
    for _ in 0..copies {
        out.extend_from_slice(&hdr);
        out.extend_from_slice(&fcrc.to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// A header plus its trailing `frame_crc`, and where the payload starts.
pub struct ParsedPreamble {
    pub header: FrameHeader,
    pub frame_crc_ok: bool,
    pub payload_offset: usize,
}

/// Parse the preamble of an on-air frame, trying the duplicate header at
/// offset `FRAMED_HEADER_LEN` if the first copy's header CRC fails (spec
/// §4.8 step 3). Returns `None` if neither copy decodes.
pub fn parse_preamble(buf: &[u8], header_dup_expected: bool) -> Option<ParsedPreamble> {
    let try_at = |off: usize| -> Option<(FrameHeader, u16, usize)> {
        if buf.len() < off + FRAMED_HEADER_LEN {
            return None;
        }
        let header = FrameHeader::decode(&buf[off..off + HEADER_LEN])?;
        let got_fcrc = u16::from_be_bytes([buf[off + 12 + 2], buf[off + 13 + 2]]);
        Some((header, got_fcrc, off + FRAMED_HEADER_LEN))
    };

    let (header, got_fcrc, mut payload_offset) = try_at(0).or_else(|| {
        if header_dup_expected {
            try_at(FRAMED_HEADER_LEN)
        } else {
            None
        }
    })?;

    // If we decoded the duplicate (primary failed), the payload still
    // follows both copies when a duplicate is configured.
    if header_dup_expected && payload_offset == FRAMED_HEADER_LEN {
        // primary decoded: payload follows the duplicate copy too.
        payload_offset = FRAMED_HEADER_LEN * 2;
    }

    let hdr_bytes = header.encode();
    let frame_crc_ok = {
        let payload_len = header.payload_len as usize;
        let payload_end = payload_offset + payload_len;
        if payload_end > buf.len() {
            false
        } else {
            frame_crc(&hdr_bytes, &buf[payload_offset..payload_end]) == got_fcrc
        }
    };

    Some(ParsedPreamble {
        header,
        frame_crc_ok,
        payload_offset,
    })
}

/// CRC-CCITT (poly 0x1021, init 0xFFFF) over `data`.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    crc16_ccitt_continue(0xFFFF, data)
}

fn crc16_ccitt_continue(init: u16, data: &[u8]) -> u16 {
    let mut crc = init;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
