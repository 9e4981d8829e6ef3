//! The binary alphabet and conversions at the model boundary.
//!
//! Bytes map to bits most-significant bit first, so `b"A"` (0x41) becomes
//! `01000001`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single binary symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Bit {
    Zero = 0,
    One = 1,
}

impl Bit {
    /// Index into per-bit arrays (`counts[bit.index()]`).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn flip(self) -> Bit {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
        }
    }

    pub fn from_bool(value: bool) -> Bit {
        if value {
            Bit::One
        } else {
            Bit::Zero
        }
    }
}

impl From<Bit> for u8 {
    fn from(bit: Bit) -> u8 {
        bit as u8
    }
}

impl From<Bit> for bool {
    fn from(bit: Bit) -> bool {
        bit == Bit::One
    }
}

impl TryFrom<u8> for Bit {
    type Error = Error;

    fn try_from(value: u8) -> Result<Bit> {
        match value {
            0 => Ok(Bit::Zero),
            1 => Ok(Bit::One),
            other => Err(Error::InvalidBit {
                value: other.to_string(),
                position: 0,
            }),
        }
    }
}

impl TryFrom<char> for Bit {
    type Error = Error;

    fn try_from(value: char) -> Result<Bit> {
        match value {
            '0' => Ok(Bit::Zero),
            '1' => Ok(Bit::One),
            other => Err(Error::InvalidBit {
                value: other.to_string(),
                position: 0,
            }),
        }
    }
}

impl std::fmt::Display for Bit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Parses a string of `0`/`1` characters.
///
/// Any other character, including whitespace, is rejected with its position.
pub fn parse_bits(text: &str) -> Result<Vec<Bit>> {
    text.chars()
        .enumerate()
        .map(|(position, c)| {
            Bit::try_from(c).map_err(|_| Error::InvalidBit {
                value: c.to_string(),
                position,
            })
        })
        .collect()
}

/// Formats bits as a string of `0`/`1` characters.
pub fn format_bits(bits: &[Bit]) -> String {
    bits.iter().map(|b| b.as_char()).collect()
}

/// Expands bytes into bits, most significant bit first.
pub fn to_bits(bytes: &[u8]) -> Vec<Bit> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for shift in (0..8).rev() {
            bits.push(Bit::from_bool(byte & (1 << shift) != 0));
        }
    }
    bits
}

/// Packs bits into bytes, most significant bit first.
///
/// Fails unless the number of bits is a multiple of 8.
pub fn to_bytes(bits: &[Bit]) -> Result<Vec<u8>> {
    if bits.len() % 8 != 0 {
        return Err(Error::BitLength { len: bits.len() });
    }
    Ok(bits
        .chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
        .collect())
}
