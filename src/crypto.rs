//! AES-CCM AEAD with a KID-indexed key table (spec §4.3).
//!
//! Nonce and AAD are derived entirely from header fields, never from a
//! counter this module owns — see [`nonce_from_header`]. Ciphertext layout
//! on the wire is `[KID(1) ‖ ct ‖ tag(8)]`.

use aes::Aes128;
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{Aead, KeyInit, Payload};
use ccm::consts::{U12, U8};
use ccm::Ccm;
use zeroize::Zeroize;

use crate::frame::{FrameHeader, HEADER_LEN};

const TAG_LEN: usize = 8;
const KEY_LEN: usize = 16;

type Aes128Ccm = Ccm<Aes128, U8, U12>;

/// A 128-bit AES key, zeroized on drop.
#[derive(Clone)]
pub struct AeadKey([u8; KEY_LEN]);

impl Zeroize for AeadKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl AeadKey {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_LEN {
            return None;
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Some(Self(key))
    }
}

/// KID → key table plus the active outbound KID. Key management and
/// rotation are external (spec §6); this only stores what's been set.
#[derive(Default)]
pub struct KeyStore {
    keys: std::collections::HashMap<u8, AeadKey>,
    active_kid: Option<u8>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, kid: u8, key16: &[u8]) -> crate::error::Result<()> {
        let key = AeadKey::from_bytes(key16).ok_or(crate::error::LinkError::InvalidKeyLength {
            kid,
            len: key16.len(),
        })?;
        self.keys.insert(kid, key);
        Ok(())
    }

    pub fn set_active_kid(&mut self, kid: u8) -> crate::error::Result<()> {
        if !self.keys.contains_key(&kid) {
            return Err(crate::error::LinkError::UnknownKid(kid));
        }
        self.active_kid = Some(kid);
        Ok(())
    }

    pub fn active_kid(&self) -> Option<u8> {
        self.active_kid
    }

    pub fn get_key(&self, kid: u8) -> Option<&AeadKey> {
        self.keys.get(&kid)
    }
}

/// Derive the 12-byte CCM nonce from header fields (spec §4.3): it is a
/// pure function of the header, never of any counter this module owns, so
/// uniqueness for a given key follows from msg_id/frag_idx uniqueness.
pub fn nonce_from_header(h: &FrameHeader) -> [u8; 12] {
    let mut n = [0u8; 12];
    n[0] = h.ver;
    n[1] = h.flags.bits();
    n[2..4].copy_from_slice(&h.frag_idx.to_le_bytes());
    n[4..6].copy_from_slice(&h.frag_cnt.to_le_bytes());
    n[6..10].copy_from_slice(&h.msg_id.to_le_bytes());
    n[10..12].copy_from_slice(&h.payload_len.to_le_bytes());
    n
}

/// AAD is the encoded header with both CRC fields zeroed (spec §4.3).
pub fn aad_from_header(h: &FrameHeader) -> [u8; HEADER_LEN] {
    h.encode_zero_crc()
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecryptError {
    UnknownKid(u8),
    TooShort,
    TagMismatch,
}

/// Encrypt `plaintext` under the key store's active KID, returning the
/// `[KID ‖ ct ‖ tag]` layout, or `None` if there is no active key (counted
/// by the caller as `enc_fail`, spec §7).
pub fn encrypt(store: &KeyStore, header: &FrameHeader, plaintext: &[u8]) -> Option<Vec<u8>> {
    let kid = store.active_kid()?;
    let key = store.get_key(kid)?;
    let cipher = Aes128Ccm::new(GenericArray::from_slice(&key.0));
    let nonce = nonce_from_header(header);
    let aad = aad_from_header(header);
    let ct = cipher
        .encrypt(
            GenericArray::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .ok()?;
    let mut out = Vec::with_capacity(1 + ct.len());
    out.push(kid);
    out.extend_from_slice(&ct);
    Some(out)
}

/// Decrypt a `[KID ‖ ct ‖ tag]` buffer against `header`'s AAD/nonce.
pub fn decrypt(store: &KeyStore, header: &FrameHeader, wire: &[u8]) -> Result<Vec<u8>, DecryptError> {
    if wire.len() < 1 + TAG_LEN {
        return Err(DecryptError::TooShort);
    }
    let kid = wire[0];
    let key = store.get_key(kid).ok_or(DecryptError::UnknownKid(kid))?;
    let cipher = Aes128Ccm::new(GenericArray::from_slice(&key.0));
    let nonce = nonce_from_header(header);
    let aad = aad_from_header(header);
    cipher
        .decrypt(
            GenericArray::from_slice(&nonce),
            Payload {
                msg: &wire[1..],
                aad: &aad,
            },
        )
        .map_err(|_| DecryptError::TagMismatch)
}
