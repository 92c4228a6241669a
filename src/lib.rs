//! Hide short text messages in images with a password-seeded blind watermark.
//!
//! The text is turned into bits, and each bit is written into one mid-band DCT
//! coefficient of one 8x8 block by quantization index modulation. Which blocks
//! are used, in which order, and which coefficient inside each block, all come
//! from pseudo-random streams seeded by the password. Extraction needs no copy
//! of the original image, only the password and the payload bit length.
//!
//! # Quick Start
//!
//! ```no_run
//! use shadowmark::{Password, WatermarkCodec};
//!
//! let codec = WatermarkCodec::default();
//! let carrier = image::open("photo.png").unwrap();
//! let embedded = codec.embed(&carrier, "HELLO", Password(12345)).unwrap();
//! embedded.image.save("photo_marked.png").unwrap();
//!
//! // The bit length is not stored in the image; keep it.
//! let text = codec
//!     .extract(&embedded.image, embedded.bit_length, Password(12345))
//!     .unwrap();
//! assert_eq!(text, "HELLO");
//! ```
//!
//! # What is not detected
//!
//! A wrong password, or a wrong bit length that is still a whole number of
//! bytes, is not an error: extraction returns unrelated text. Saving the stego
//! image in a lossy format such as JPEG may destroy the watermark, which is
//! why [`save_image`] refuses lossy formats.

#![deny(missing_docs)]

pub mod bits;
mod codec;
pub mod error;
mod io;
pub mod schedule;
pub mod transform;

pub use bits::{BitSequence, TextEncoding};
pub use codec::{CodecOptions, Embedded, WatermarkCodec};
pub use error::{Error, Result};
pub use io::{
    default_output_path, embed_file, extract_file, is_lossless, is_supported_image, load_image,
    save_image,
};
pub use schedule::{build_schedule, BitSite, DomainTag, EmbeddingSchedule, Password};
