//! Block transform and single-coefficient bit modulation.
//!
//! Each 8x8 block of one channel is taken into the frequency domain with an
//! orthonormal 2-D DCT-II. One mid-band coefficient per block carries one bit
//! by quantization index modulation (QIM): with step `strength`, the
//! coefficient is moved onto a multiple `n * strength` whose index `n` is even
//! for `0` and odd for `1`. Reading rounds back to the nearest index, so any
//! later disturbance smaller than `strength / 2` leaves the bit intact.
//!
//! Rounding the reconstructed block to 8-bit samples disturbs a coefficient by
//! well under one unit. Clipping at 0 or 255 can disturb it by much more,
//! which is what [`embed_bit`] refines away.

use std::sync::OnceLock;

/// Side length of a square block, in pixels.
pub const BLOCK_SIZE: usize = 8;

/// Samples per block.
pub const BLOCK_LEN: usize = BLOCK_SIZE * BLOCK_SIZE;

/// Default QIM step.
pub const DEFAULT_STRENGTH: f64 = 24.0;

/// Smallest accepted QIM step.
pub const MIN_STRENGTH: f64 = 8.0;

/// Largest accepted QIM step.
pub const MAX_STRENGTH: f64 = 128.0;

/// Upper bound on write/reconstruct rounds for a block that clips.
const MAX_REFINE_PASSES: usize = 16;

/// Candidate coefficient positions (`row * 8 + col`), all mid-band with both
/// frequencies non-zero.
pub const EMBED_POSITIONS: [usize; 8] = [10, 17, 11, 18, 25, 12, 19, 26];

/// 64 samples of one channel in row-major order.
pub type PixelBlock = [u8; BLOCK_LEN];

/// Chooses one entry of [`EMBED_POSITIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub u8);

impl Selector {
    /// Coefficient index (`row * 8 + col`) this selector designates.
    #[must_use]
    pub fn position(self) -> usize {
        EMBED_POSITIONS[usize::from(self.0) % EMBED_POSITIONS.len()]
    }
}

/// DCT coefficients of one block, in natural (row-major) order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoefficientSet(pub [f64; BLOCK_LEN]);

impl CoefficientSet {
    /// Value of the coefficient a selector designates.
    #[must_use]
    pub fn get(&self, selector: Selector) -> f64 {
        self.0[selector.position()]
    }
}

/// `BASIS[u][x] = C(u) * cos((2x + 1) * u * PI / 16)`, with `C(0) = 1/sqrt(8)`
/// and `C(u > 0) = 1/2`.
static BASIS: OnceLock<[[f64; BLOCK_SIZE]; BLOCK_SIZE]> = OnceLock::new();

fn basis() -> &'static [[f64; BLOCK_SIZE]; BLOCK_SIZE] {
    BASIS.get_or_init(|| {
        let mut table = [[0.0f64; BLOCK_SIZE]; BLOCK_SIZE];
        for (u, row) in table.iter_mut().enumerate() {
            let norm = if u == 0 { (8.0f64).sqrt().recip() } else { 0.5 };
            for (x, v) in row.iter_mut().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let angle = (2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / 16.0;
                *v = norm * angle.cos();
            }
        }
        table
    })
}

/// Forward 8x8 DCT of a pixel block (level shifted by -128).
#[must_use]
pub fn forward(block: &PixelBlock) -> CoefficientSet {
    let b = basis();

    // Rows.
    let mut temp = [0.0f64; BLOCK_LEN];
    for row in 0..BLOCK_SIZE {
        for u in 0..BLOCK_SIZE {
            temp[row * BLOCK_SIZE + u] = (0..BLOCK_SIZE)
                .map(|x| (f64::from(block[row * BLOCK_SIZE + x]) - 128.0) * b[u][x])
                .sum();
        }
    }

    // Columns.
    let mut coeffs = [0.0f64; BLOCK_LEN];
    for col in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            coeffs[v * BLOCK_SIZE + col] = (0..BLOCK_SIZE)
                .map(|y| temp[y * BLOCK_SIZE + col] * b[v][y])
                .sum();
        }
    }

    CoefficientSet(coeffs)
}

/// Inverse DCT without rounding or clipping.
fn inverse_f64(coeffs: &CoefficientSet) -> [f64; BLOCK_LEN] {
    let b = basis();
    let f = &coeffs.0;

    // Columns.
    let mut temp = [0.0f64; BLOCK_LEN];
    for col in 0..BLOCK_SIZE {
        for y in 0..BLOCK_SIZE {
            temp[y * BLOCK_SIZE + col] = (0..BLOCK_SIZE)
                .map(|v| f[v * BLOCK_SIZE + col] * b[v][y])
                .sum();
        }
    }

    // Rows.
    let mut pixels = [0.0f64; BLOCK_LEN];
    for row in 0..BLOCK_SIZE {
        for x in 0..BLOCK_SIZE {
            pixels[row * BLOCK_SIZE + x] = (0..BLOCK_SIZE)
                .map(|u| temp[row * BLOCK_SIZE + u] * b[u][x])
                .sum::<f64>()
                + 128.0;
        }
    }

    pixels
}

/// Inverse 8x8 DCT, rounded to the nearest sample and clipped to `0..=255`.
#[must_use]
pub fn inverse(coeffs: &CoefficientSet) -> PixelBlock {
    let samples = inverse_f64(coeffs);
    let mut block = [0u8; BLOCK_LEN];
    for (out, s) in block.iter_mut().zip(samples) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            *out = s.round().clamp(0.0, 255.0) as u8;
        }
    }
    block
}

/// Quantization index of `value` for step `strength`.
#[allow(clippy::cast_possible_truncation)]
fn index_of(value: f64, strength: f64) -> i64 {
    (value / strength).round() as i64
}

/// Nearest quantization index to `value` whose parity encodes `bit`.
#[allow(clippy::cast_possible_truncation)]
fn nearest_index(value: f64, strength: f64, bit: bool) -> i64 {
    let t = value / strength;
    if bit {
        2 * ((t - 1.0) / 2.0).round() as i64 + 1
    } else {
        2 * (t / 2.0).round() as i64
    }
}

#[allow(clippy::cast_precision_loss)]
fn lattice_point(index: i64, strength: f64) -> f64 {
    index as f64 * strength
}

/// Move the selected coefficient onto the nearest lattice point encoding
/// `bit`. All other coefficients are left untouched.
#[must_use]
pub fn write_bit(
    coeffs: &CoefficientSet,
    selector: Selector,
    bit: bool,
    strength: f64,
) -> CoefficientSet {
    let pos = selector.position();
    let mut out = *coeffs;
    out.0[pos] = lattice_point(nearest_index(coeffs.0[pos], strength, bit), strength);
    out
}

/// Read the bit stored in the selected coefficient.
#[must_use]
pub fn read_bit(coeffs: &CoefficientSet, selector: Selector, strength: f64) -> bool {
    index_of(coeffs.get(selector), strength).rem_euclid(2) == 1
}

/// Re-apply `target` to the coefficient at `pos` until the reconstructed
/// 8-bit block holds it within a quarter step.
fn settle(block: &PixelBlock, pos: usize, target: f64, strength: f64) -> Option<PixelBlock> {
    let mut pixels = *block;
    for _ in 0..MAX_REFINE_PASSES {
        let mut coeffs = forward(&pixels);
        if (coeffs.0[pos] - target).abs() <= strength / 4.0 {
            return Some(pixels);
        }
        coeffs.0[pos] = target;
        pixels = inverse(&coeffs);
    }

    let settled = forward(&pixels).0[pos];
    ((settled - target).abs() < strength / 2.0).then_some(pixels)
}

/// Write `bit` into a pixel block and return the reconstructed block.
///
/// The nearest lattice point is tried first. If clipping keeps the block from
/// reaching it, the nearest point on the other side of the current value is
/// tried. The returned block always reads back as `bit`. Returns `None` only
/// if neither point is reachable within the sample range.
#[must_use]
pub fn embed_bit(
    block: &PixelBlock,
    selector: Selector,
    bit: bool,
    strength: f64,
) -> Option<PixelBlock> {
    let pos = selector.position();
    let current = forward(block).0[pos];
    let first = nearest_index(current, strength, bit);
    let second = if lattice_point(first, strength) > current {
        first - 2
    } else {
        first + 2
    };

    [first, second]
        .into_iter()
        .find_map(|index| settle(block, pos, lattice_point(index, strength), strength))
}
