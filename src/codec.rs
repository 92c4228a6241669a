//! Whole-image embed and extract.

use image::DynamicImage;

use crate::bits::{self, BitSequence, TextEncoding};
use crate::error::{Error, Result};
use crate::schedule::{self, BitSite, Password};
use crate::transform::{self, PixelBlock, BLOCK_SIZE, DEFAULT_STRENGTH, MAX_STRENGTH, MIN_STRENGTH};

/// Options shared by embedding and extraction.
///
/// Extraction must use the same `strength` and `redundancy` as the embed that
/// produced the image, otherwise it silently returns the wrong text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecOptions {
    /// QIM step applied to the selected coefficient of every block.
    /// Larger values survive more disturbance but are more visible.
    pub strength: f64,
    /// Repeat the payload over every spare block and majority-vote on read.
    pub redundancy: bool,
    /// How text is turned into bytes at embed time.
    pub encoding: TextEncoding,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            redundancy: true,
            encoding: TextEncoding::Utf8,
        }
    }
}

impl CodecOptions {
    /// Check that every option is within its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if `strength` is not a finite value in
    /// `MIN_STRENGTH..=MAX_STRENGTH`.
    pub fn validate(&self) -> Result<()> {
        if !self.strength.is_finite() || !(MIN_STRENGTH..=MAX_STRENGTH).contains(&self.strength) {
            return Err(Error::InvalidOption(format!(
                "strength must be between {MIN_STRENGTH} and {MAX_STRENGTH}, got {}",
                self.strength
            )));
        }
        Ok(())
    }
}

/// Output of a successful embed.
#[derive(Debug, Clone)]
pub struct Embedded {
    /// The stego image, in the same pixel layout as the carrier.
    pub image: DynamicImage,
    /// Payload length in bits. Not stored in the image: keep it, it is
    /// required for extraction.
    pub bit_length: usize,
}

/// Sample layout and block grid of a supported image.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    width: usize,
    /// Interleaved samples per pixel.
    stride: usize,
    /// Leading samples per pixel that carry colour; alpha is never touched.
    colour: usize,
    blocks_wide: usize,
    blocks_tall: usize,
}

impl Geometry {
    fn of(image: &DynamicImage) -> Result<Self> {
        let (stride, colour) = match image {
            DynamicImage::ImageLuma8(_) => (1, 1),
            DynamicImage::ImageLumaA8(_) => (2, 1),
            DynamicImage::ImageRgb8(_) => (3, 3),
            DynamicImage::ImageRgba8(_) => (4, 3),
            other => {
                return Err(Error::ImageFormat(format!(
                    "{:?} pixels are not supported, expected 8-bit grey or RGB",
                    other.color()
                )))
            }
        };

        let width = image.width() as usize;
        let height = image.height() as usize;
        if width == 0 || height == 0 {
            return Err(Error::ImageFormat(format!("image is empty ({width}x{height})")));
        }

        Ok(Self {
            width,
            stride,
            colour,
            blocks_wide: width / BLOCK_SIZE,
            blocks_tall: height / BLOCK_SIZE,
        })
    }

    fn block_count(&self) -> usize {
        self.blocks_wide * self.blocks_tall
    }

    /// Sample offset of the top-left pixel of `block` in `channel`.
    fn origin(&self, block: usize, channel: usize) -> usize {
        let bx = block % self.blocks_wide * BLOCK_SIZE;
        let by = block / self.blocks_wide * BLOCK_SIZE;
        (by * self.width + bx) * self.stride + channel
    }

    fn gather(&self, samples: &[u8], block: usize, channel: usize) -> PixelBlock {
        let origin = self.origin(block, channel);
        let mut out = [0u8; transform::BLOCK_LEN];
        for (y, row) in out.chunks_exact_mut(BLOCK_SIZE).enumerate() {
            let line = origin + y * self.width * self.stride;
            for (x, px) in row.iter_mut().enumerate() {
                *px = samples[line + x * self.stride];
            }
        }
        out
    }

    fn scatter(&self, samples: &mut [u8], block: usize, channel: usize, pixels: &PixelBlock) {
        let origin = self.origin(block, channel);
        for (y, row) in pixels.chunks_exact(BLOCK_SIZE).enumerate() {
            let line = origin + y * self.width * self.stride;
            for (x, px) in row.iter().enumerate() {
                samples[line + x * self.stride] = *px;
            }
        }
    }
}

fn samples(image: &DynamicImage) -> Option<&[u8]> {
    match image {
        DynamicImage::ImageLuma8(b) => Some(&**b),
        DynamicImage::ImageLumaA8(b) => Some(&**b),
        DynamicImage::ImageRgb8(b) => Some(&**b),
        DynamicImage::ImageRgba8(b) => Some(&**b),
        _ => None,
    }
}

fn samples_mut(image: &mut DynamicImage) -> Option<&mut [u8]> {
    match image {
        DynamicImage::ImageLuma8(b) => Some(&mut **b),
        DynamicImage::ImageLumaA8(b) => Some(&mut **b),
        DynamicImage::ImageRgb8(b) => Some(&mut **b),
        DynamicImage::ImageRgba8(b) => Some(&mut **b),
        _ => None,
    }
}

fn unsupported() -> Error {
    Error::ImageFormat("pixel samples are not 8-bit".to_string())
}

/// One unit of block work: a schedule site in one colour channel.
type Job = (BitSite, usize);

/// Site-major, channel-minor, so the first job of every bit is its primary
/// site in channel 0.
fn jobs<'a>(sites: impl Iterator<Item = &'a BitSite>, colour: usize) -> Vec<Job> {
    sites
        .flat_map(|site| (0..colour).map(move |channel| (*site, channel)))
        .collect()
}

/// Run `f` over every job, in parallel when the `parallel` feature is on.
/// Results come back in job order either way.
fn map_jobs<T, F>(jobs: &[Job], f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Job) -> T + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        jobs.par_iter().map(f).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        jobs.iter().map(f).collect()
    }
}

/// Majority vote per bit. An exact tie falls back to the first read, which
/// is the primary site in channel 0.
fn vote(jobs: &[Job], reads: &[bool], bit_length: usize) -> BitSequence {
    let mut ones = vec![0usize; bit_length];
    let mut total = vec![0usize; bit_length];
    let mut first: Vec<Option<bool>> = vec![None; bit_length];

    for ((site, _), &bit) in jobs.iter().zip(reads) {
        total[site.bit] += 1;
        ones[site.bit] += usize::from(bit);
        first[site.bit].get_or_insert(bit);
    }

    (0..bit_length)
        .map(|i| match (2 * ones[i]).cmp(&total[i]) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => first[i].unwrap_or(false),
        })
        .collect()
}

/// The password-seeded blind watermark codec.
///
/// Holds only its options; every call is independent, so one codec can be
/// shared across threads.
#[derive(Debug, Clone, Default)]
pub struct WatermarkCodec {
    options: CodecOptions,
}

impl WatermarkCodec {
    /// Create a codec with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the options are out of range.
    pub fn new(options: CodecOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// The options this codec was built with.
    #[must_use]
    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Maximum payload in bits: one per whole 8x8 block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageFormat`] for unsupported or empty images.
    pub fn capacity(&self, image: &DynamicImage) -> Result<usize> {
        Ok(Geometry::of(image)?.block_count())
    }

    /// Hide `text` in a copy of `image`.
    ///
    /// The carrier is not modified. Blocks never chosen by the schedule, and
    /// any alpha channel, are copied through unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::ImageFormat`] for unsupported or empty images.
    /// - [`Error::Encoding`] for empty text, or non-ASCII text in ASCII mode.
    /// - [`Error::Capacity`] if the text needs more bits than the image has
    ///   blocks.
    /// - [`Error::Unembeddable`] if a block cannot hold its bit.
    pub fn embed(&self, image: &DynamicImage, text: &str, password: Password) -> Result<Embedded> {
        let geo = Geometry::of(image)?;
        let payload = bits::encode(text, self.options.encoding)?;
        let schedule = schedule::build_schedule(
            password,
            geo.block_count(),
            payload.len(),
            self.options.redundancy,
        )?;

        let source = samples(image).ok_or_else(unsupported)?;
        let strength = self.options.strength;
        let work = jobs(schedule.sites(), geo.colour);

        let updated = map_jobs(&work, |(site, channel)| {
            let bit = payload.get(site.bit).unwrap_or(false);
            let pixels = geo.gather(source, site.block, *channel);
            transform::embed_bit(&pixels, site.selector, bit, strength)
                .map(|out| (site.block, *channel, out))
                .ok_or(Error::Unembeddable { block: site.block })
        })
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let mut stego = image.clone();
        let target = samples_mut(&mut stego).ok_or_else(unsupported)?;
        for (block, channel, pixels) in &updated {
            geo.scatter(target, *block, *channel, pixels);
        }

        Ok(Embedded {
            image: stego,
            bit_length: schedule.bit_length(),
        })
    }

    /// Recover text of `bit_length` bits from a stego image.
    ///
    /// A wrong password is not detected: it yields unrelated, usually
    /// garbled, text. A wrong `bit_length` that is still a whole number of
    /// bytes behaves the same way.
    ///
    /// # Errors
    ///
    /// - [`Error::LengthMismatch`] if `bit_length` is zero or not a multiple
    ///   of 8.
    /// - [`Error::ImageFormat`] for unsupported or empty images.
    /// - [`Error::Capacity`] if `bit_length` exceeds the block count.
    pub fn extract(
        &self,
        image: &DynamicImage,
        bit_length: usize,
        password: Password,
    ) -> Result<String> {
        bits::check_length(bit_length)?;
        let geo = Geometry::of(image)?;
        let schedule = schedule::build_schedule(
            password,
            geo.block_count(),
            bit_length,
            self.options.redundancy,
        )?;

        let source = samples(image).ok_or_else(unsupported)?;
        let strength = self.options.strength;
        let work = jobs(schedule.sites(), geo.colour);

        let reads = map_jobs(&work, |(site, channel)| {
            let coeffs = transform::forward(&geo.gather(source, site.block, *channel));
            transform::read_bit(&coeffs, site.selector, strength)
        });

        bits::decode(&vote(&work, &reads, schedule.bit_length()))
    }
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn textured_gray(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            Luma([((x * 7 + y * 13) % 200 + 28) as u8])
        }))
    }

    #[test]
    fn geometry_counts_whole_blocks_only() {
        let img = textured_gray(70, 33);
        let geo = Geometry::of(&img).unwrap();
        assert_eq!(geo.blocks_wide, 8);
        assert_eq!(geo.blocks_tall, 4);
        assert_eq!(geo.block_count(), 32);
    }

    #[test]
    fn gather_scatter_round_trip() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(24, 16, |x, y| {
            Rgb([x as u8, y as u8, (x + y) as u8])
        }));
        let geo = Geometry::of(&img).unwrap();
        let src = samples(&img).unwrap();

        let green = geo.gather(src, 4, 1);
        // Block 4 is the second block of the second row: x in 8..16, y in 8..16.
        assert_eq!(green[0], 8);
        assert_eq!(green[63], 15);

        let mut copy = img.clone();
        let dst = samples_mut(&mut copy).unwrap();
        geo.scatter(dst, 4, 1, &[0u8; transform::BLOCK_LEN]);
        let after = copy.to_rgb8();
        assert_eq!(after.get_pixel(9, 9), &Rgb([9, 0, 18]));
        assert_eq!(after.get_pixel(7, 9), &Rgb([7, 9, 16]));
    }

    #[test]
    fn rejects_wide_samples() {
        let img = DynamicImage::ImageLuma16(image::ImageBuffer::new(16, 16));
        let codec = WatermarkCodec::default();
        assert!(matches!(codec.capacity(&img), Err(Error::ImageFormat(_))));
    }

    #[test]
    fn rejects_empty_image() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let codec = WatermarkCodec::default();
        assert!(matches!(
            codec.embed(&img, "hi", Password(1)),
            Err(Error::ImageFormat(_))
        ));
    }

    #[test]
    fn invalid_strength_is_rejected() {
        let opts = CodecOptions {
            strength: 2.0,
            ..CodecOptions::default()
        };
        assert!(matches!(
            WatermarkCodec::new(opts),
            Err(Error::InvalidOption(_))
        ));
        let opts = CodecOptions {
            strength: f64::NAN,
            ..CodecOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn embed_does_not_mutate_carrier() {
        let img = textured_gray(64, 64);
        let before = img.clone();
        let codec = WatermarkCodec::default();
        let out = codec.embed(&img, "hi", Password(9)).unwrap();
        assert_eq!(img.as_bytes(), before.as_bytes());
        assert_ne!(out.image.as_bytes(), img.as_bytes());
        assert_eq!(out.bit_length, 16);
    }

    #[test]
    fn alpha_channel_untouched() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(32, 32, |x, y| {
            Rgba([(x * 5) as u8 + 40, (y * 5) as u8 + 40, 128, (x + y) as u8])
        }));
        let codec = WatermarkCodec::default();
        let out = codec.embed(&img, "A", Password(3)).unwrap();
        let (a, b) = (img.to_rgba8(), out.image.to_rgba8());
        for (p, q) in a.pixels().zip(b.pixels()) {
            assert_eq!(p[3], q[3]);
        }
        assert_eq!(codec.extract(&out.image, 8, Password(3)).unwrap(), "A");
    }

    #[test]
    fn trailing_partial_blocks_untouched() {
        // 4x2 whole blocks plus a 4-pixel ragged edge on the right and bottom.
        let img = textured_gray(36, 20);
        let codec = WatermarkCodec::default();
        assert_eq!(codec.capacity(&img).unwrap(), 8);

        let out = codec.embed(&img, "A", Password(17)).unwrap();
        let (a, b) = (img.to_luma8(), out.image.to_luma8());
        assert_ne!(a, b);
        for y in 0..20 {
            for x in 32..36 {
                assert_eq!(a.get_pixel(x, y), b.get_pixel(x, y));
            }
        }
        for y in 16..20 {
            for x in 0..36 {
                assert_eq!(a.get_pixel(x, y), b.get_pixel(x, y));
            }
        }
        assert_eq!(codec.extract(&out.image, 8, Password(17)).unwrap(), "A");
    }

    #[test]
    fn vote_breaks_ties_with_primary_read() {
        let site = |bit| BitSite {
            bit,
            block: 0,
            selector: transform::Selector(0),
        };
        let work = vec![(site(0), 0), (site(0), 1), (site(1), 0), (site(1), 1)];
        let bits = vote(&work, &[true, false, false, true], 2);
        assert_eq!(bits.as_slice(), &[true, false]);

        let work = vec![(site(0), 0), (site(0), 0), (site(0), 0)];
        let bits = vote(&work, &[false, true, true], 1);
        assert_eq!(bits.as_slice(), &[true]);
    }

    #[test]
    fn extract_checks_length_before_image() {
        let img = DynamicImage::ImageLuma16(image::ImageBuffer::new(16, 16));
        let codec = WatermarkCodec::default();
        assert!(matches!(
            codec.extract(&img, 7, Password(1)),
            Err(Error::LengthMismatch { bits: 7 })
        ));
    }
}
