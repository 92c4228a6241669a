//! Password-derived embedding schedule.
//!
//! A password is expanded into two independent pseudo-random streams, one per
//! [`DomainTag`]. The block stream drives a Fisher-Yates permutation of every
//! block in the image; the coefficient stream picks which transform
//! coefficient each of those blocks uses. Both embed and extract rebuild the
//! schedule from scratch and walk it through [`EmbeddingSchedule::sites`], so
//! the two directions cannot drift apart.
//!
//! # Collision policy
//!
//! Every block appears at most once in the permutation, so no two sites ever
//! share a block. The first `bit_length` permuted blocks are the primary sites
//! of bits `0..bit_length`. With redundancy enabled, every further block
//! carries another copy of bit `j % bit_length`. A payload longer than the
//! block count is rejected with [`Error::Capacity`] rather than wrapped.
//!
//! # Cross-platform portability
//!
//! Shuffle and selector draws use `u32` ranges so the schedule is identical on
//! 32-bit and 64-bit targets.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use sha3::{Digest, Sha3_256};

use crate::bits;
use crate::error::{Error, Result};
use crate::transform::{Selector, EMBED_POSITIONS};

/// The shared secret for embedding and extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Password(pub u64);

impl From<u64> for Password {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for Password {
    type Err = Error;

    /// Parse a decimal integer. Negative values map onto their
    /// two's-complement `u64` so that any integer a user types is usable.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(v) = s.parse::<u64>() {
            return Ok(Self(v));
        }
        s.parse::<i64>()
            .map(|v| Self(u64::from_ne_bytes(v.to_ne_bytes())))
            .map_err(|_| Error::InvalidOption(format!("password must be an integer, got {s:?}")))
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Separates the independent streams derived from one password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainTag {
    /// Which blocks carry payload bits, and in which order.
    Blocks,
    /// Which coefficient inside each block is modulated.
    Coefficients,
}

impl DomainTag {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            DomainTag::Blocks => b"shadowmark/blocks/v1",
            DomainTag::Coefficients => b"shadowmark/coefficients/v1",
        }
    }
}

/// A deterministic pseudo-random stream.
pub type KeyStream = Xoshiro256PlusPlus;

/// Derive the stream for `(password, domain)`.
///
/// The password and tag are hashed with SHA3-256 into the 256-bit generator
/// seed, so adjacent passwords produce unrelated streams.
#[must_use]
pub fn derive(password: Password, domain: DomainTag) -> KeyStream {
    let mut hasher = Sha3_256::new();
    hasher.update(password.0.to_le_bytes());
    hasher.update(domain.as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());
    KeyStream::from_seed(seed)
}

/// One embedding site: a payload bit, the block that stores it, and the
/// coefficient inside that block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSite {
    /// Index into the payload bit sequence.
    pub bit: usize,
    /// Raster index of the block.
    pub block: usize,
    /// Coefficient to modulate within the block.
    pub selector: Selector,
}

/// The ordered list of sites for one payload length and password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSchedule {
    bit_length: usize,
    sites: Vec<BitSite>,
}

impl EmbeddingSchedule {
    /// Number of payload bits.
    #[must_use]
    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    /// Every site in schedule order: primary sites first, then redundant
    /// copies.
    pub fn sites(&self) -> impl ExactSizeIterator<Item = &BitSite> + Clone + '_ {
        self.sites.iter()
    }
}

/// Fisher-Yates shuffle of `0..block_count` driven by `rng`.
fn permute_blocks(block_count: usize, rng: &mut KeyStream) -> Vec<usize> {
    let mut order: Vec<usize> = (0..block_count).collect();
    for i in (1..block_count).rev() {
        #[allow(clippy::cast_possible_truncation)]
        let j = rng.random_range(0..=i as u32) as usize;
        order.swap(i, j);
    }
    order
}

/// Build the embedding schedule for a payload of `bit_length` bits over an
/// image of `block_count` blocks.
///
/// # Errors
///
/// Returns [`Error::LengthMismatch`] if `bit_length` is zero,
/// [`Error::Capacity`] if `bit_length > block_count`, and
/// [`Error::ImageFormat`] if the image has more blocks than the portable
/// 32-bit shuffle can index.
pub fn build_schedule(
    password: Password,
    block_count: usize,
    bit_length: usize,
    redundancy: bool,
) -> Result<EmbeddingSchedule> {
    if bit_length == 0 {
        return Err(Error::LengthMismatch { bits: 0 });
    }
    if bit_length > block_count {
        return Err(Error::Capacity {
            needed: bit_length,
            available: block_count,
        });
    }
    if u32::try_from(block_count).is_err() {
        return Err(Error::ImageFormat(format!(
            "{block_count} blocks exceeds the supported maximum"
        )));
    }

    let mut block_rng = derive(password, DomainTag::Blocks);
    let mut coeff_rng = derive(password, DomainTag::Coefficients);

    let order = permute_blocks(block_count, &mut block_rng);

    // One selector draw per permuted block, independent of bit_length.
    #[allow(clippy::cast_possible_truncation)]
    let choices = EMBED_POSITIONS.len() as u32;
    let used = if redundancy { block_count } else { bit_length };

    let sites = order
        .into_iter()
        .take(used)
        .enumerate()
        .map(|(j, block)| {
            #[allow(clippy::cast_possible_truncation)]
            let selector = Selector(coeff_rng.random_range(0..choices) as u8);
            BitSite {
                bit: j % bit_length,
                block,
                selector,
            }
        })
        .collect();

    Ok(EmbeddingSchedule { bit_length, sites })
}

/// Capacity in whole bytes of text for an image of `block_count` blocks.
#[must_use]
pub fn capacity_bytes(block_count: usize) -> usize {
    block_count / bits::BITS_PER_BYTE
}
