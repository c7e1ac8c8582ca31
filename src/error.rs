//! Caller-facing error surface.
//!
//! Per-frame channel noise (bad CRC, a failed AEAD tag, a length mismatch) is
//! never represented here — those are counted in [`crate::metrics::Metrics`]
//! and the engine keeps running. `LinkError` is reserved for misuse of the
//! public API: bad configuration, an unknown key id, a malformed key.

use thiserror::Error;

/// Errors that can occur while configuring or driving the link engine.
#[derive(Debug, Error)]
pub enum LinkError {
    /// MTU too small to carry a 14-byte header and at least one payload byte.
    #[error("MTU {0} too small for a 14-byte header")]
    MtuTooSmall(u16),

    /// ARQ window must be at least 1.
    #[error("window size must be >= 1, got {0}")]
    InvalidWindow(u8),

    /// Interleave depth outside the supported set; see channel codec Open Question.
    #[error("interleave depth {0} is not one of {{1,4,8,16}}")]
    InvalidInterleaveDepth(u8),

    /// AEAD key material must be exactly 16 bytes (AES-128).
    #[error("key for kid {kid} must be 16 bytes, got {len}")]
    InvalidKeyLength { kid: u8, len: usize },

    /// `set_active_kid` referenced a kid with no key installed.
    #[error("no key installed for kid {0}")]
    UnknownKid(u8),

    /// Requested FEC/interleave combination cannot be constructed.
    #[error("invalid channel codec configuration: {0}")]
    InvalidChannelConfig(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
