//! Text to bit-sequence conversion.
//!
//! Text is stored as its raw bytes, most significant bit first, in input
//! order. Nothing marks where the payload ends: the caller keeps the bit
//! length and hands it back at extraction time.

use crate::error::{Error, Result};

/// Number of bits carried by one byte of text.
pub const BITS_PER_BYTE: usize = 8;

/// Character encoding used to turn text into bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8, one to four bytes per character.
    #[default]
    Utf8,
    /// 7-bit ASCII, exactly one byte per character.
    Ascii,
}

/// An ordered sequence of payload bits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSequence(Vec<bool>);

impl BitSequence {
    /// Number of bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence holds no bits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bit at `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<bool> {
        self.0.get(index).copied()
    }

    /// Iterate over the bits in order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    /// Borrow the bits as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

impl From<Vec<bool>> for BitSequence {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl FromIterator<bool> for BitSequence {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Convert text into its bit sequence.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if `text` is empty, or if `encoding` is
/// [`TextEncoding::Ascii`] and `text` contains a non-ASCII character.
pub fn encode(text: &str, encoding: TextEncoding) -> Result<BitSequence> {
    if text.is_empty() {
        return Err(Error::Encoding("text is empty".to_string()));
    }

    if encoding == TextEncoding::Ascii {
        if let Some((pos, ch)) = text.char_indices().find(|(_, c)| !c.is_ascii()) {
            return Err(Error::Encoding(format!(
                "character {ch:?} at byte {pos} is not ASCII"
            )));
        }
    }

    Ok(text
        .bytes()
        .flat_map(|byte| (0..BITS_PER_BYTE).rev().map(move |i| (byte >> i) & 1 == 1))
        .collect())
}

/// Convert a bit sequence back into text.
///
/// Byte sequences that are not valid UTF-8 (the usual outcome of a wrong
/// password) are decoded lossily with U+FFFD replacement characters.
///
/// # Errors
///
/// Returns [`Error::LengthMismatch`] if the sequence is empty or its length
/// is not a multiple of [`BITS_PER_BYTE`].
pub fn decode(bits: &BitSequence) -> Result<String> {
    check_length(bits.len())?;

    let bytes: Vec<u8> = bits
        .as_slice()
        .chunks_exact(BITS_PER_BYTE)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
        .collect();

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Check that `bits` is a whole, non-zero number of bytes.
///
/// # Errors
///
/// Returns [`Error::LengthMismatch`] otherwise.
pub fn check_length(bits: usize) -> Result<()> {
    if bits == 0 || bits % BITS_PER_BYTE != 0 {
        return Err(Error::LengthMismatch { bits });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_is_msb_first() {
        // 'A' = 0x41 = 0b0100_0001
        let bits = encode("A", TextEncoding::Utf8).unwrap();
        let expected = [false, true, false, false, false, false, false, true];
        assert_eq!(bits.as_slice(), &expected);
    }

    #[test]
    fn encode_hello_is_forty_bits() {
        let bits = encode("HELLO", TextEncoding::Ascii).unwrap();
        assert_eq!(bits.len(), 40);
    }

    #[test]
    fn encode_multibyte_utf8() {
        let bits = encode("水印", TextEncoding::Utf8).unwrap();
        assert_eq!(bits.len(), 6 * BITS_PER_BYTE);
        assert_eq!(decode(&bits).unwrap(), "水印");
    }

    #[test]
    fn encode_rejects_empty_text() {
        assert!(matches!(
            encode("", TextEncoding::Utf8),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn ascii_rejects_non_ascii() {
        let err = encode("café", TextEncoding::Ascii).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
        assert!(err.to_string().contains("byte 3"));
    }

    #[test]
    fn decode_rejects_partial_bytes() {
        let bits = encode("HELLO", TextEncoding::Utf8).unwrap();
        let short: BitSequence = bits.iter().take(39).collect();
        assert!(matches!(
            decode(&short),
            Err(Error::LengthMismatch { bits: 39 })
        ));
        assert!(matches!(
            decode(&BitSequence::default()),
            Err(Error::LengthMismatch { bits: 0 })
        ));
    }

    #[test]
    fn decode_invalid_utf8_is_lossy() {
        // 0xFF is never valid in UTF-8.
        let bits = BitSequence::from(vec![true; 8]);
        assert_eq!(decode(&bits).unwrap(), "\u{FFFD}");
    }

    proptest! {
        #[test]
        fn round_trip_any_text(s in "\\PC{1,64}") {
            let bits = encode(&s, TextEncoding::Utf8).unwrap();
            prop_assert_eq!(bits.len(), s.len() * BITS_PER_BYTE);
            prop_assert_eq!(decode(&bits).unwrap(), s);
        }

        #[test]
        fn decode_never_panics(raw in proptest::collection::vec(any::<bool>(), 0..200)) {
            let bits = BitSequence::from(raw);
            let len = bits.len();
            match decode(&bits) {
                Ok(_) => prop_assert!(len > 0 && len % 8 == 0),
                Err(Error::LengthMismatch { bits }) => prop_assert_eq!(bits, len),
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }
    }
}
