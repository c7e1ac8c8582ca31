//! Byte-level matrix interleaver: write row-major, read column-major,
//! skipping any cell past the input length so interleaved length always
//! equals input length (spec §4.2 — no padding, no length side-channel).

use serde::{Deserialize, Serialize};

/// Supported interleave depths. Any other requested depth clamps to `D1`
/// (spec §9 Open Question resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterleaveDepth {
    D1,
    D4,
    D8,
    D16,
}

impl InterleaveDepth {
    pub fn depth(self) -> usize {
        match self {
            InterleaveDepth::D1 => 1,
            InterleaveDepth::D4 => 4,
            InterleaveDepth::D8 => 8,
            InterleaveDepth::D16 => 16,
        }
    }

    /// Clamp an arbitrary requested depth to the supported set.
    pub fn clamp(requested: u8) -> InterleaveDepth {
        match requested {
            4 => InterleaveDepth::D4,
            8 => InterleaveDepth::D8,
            16 => InterleaveDepth::D16,
            _ => InterleaveDepth::D1,
        }
    }
}

/// Row-major write, column-major read. Cells past `data.len()` in the
/// `depth x cols` grid are skipped rather than emitted as padding, so
/// `interleave(data, depth).len() == data.len()` always.
pub fn interleave(data: &[u8], depth: InterleaveDepth) -> Vec<u8> {
    let d = depth.depth();
    if d <= 1 || data.is_empty() {
        return data.to_vec();
    }
    let len = data.len();
    let cols = len.div_ceil(d);
    let mut out = Vec::with_capacity(len);
    for col in 0..cols {
        for row in 0..d {
            let idx = row * cols + col;
            if idx < len {
                out.push(data[idx]);
            }
        }
    }
    out
}

/// Inverse of [`interleave`]. The grid shape is recovered from `data.len()`
/// directly since interleaving never pads.
pub fn deinterleave(data: &[u8], depth: InterleaveDepth) -> Vec<u8> {
    let d = depth.depth();
    if d <= 1 || data.is_empty() {
        return data.to_vec();
    }
    let len = data.len();
    let cols = len.div_ceil(d);
    let mut grid = vec![0u8; d * cols];
    let mut it = data.iter();
    for col in 0..cols {
        for row in 0..d {
            let idx = row * cols + col;
            if idx < len {
                if let Some(&b) = it.next() {
                    grid[idx] = b;
                }
            }
        }
    }
    grid.truncate(len);
    grid
}
