//! MySQL `latin1` Character Set
//!
//! MySQL's `latin1` is not ISO-8859-1: it is ISO-8859-1 with the 0x80-0x9F
//! control range replaced by the 32 Windows-1252 characters. This module
//! converts between that single-byte space and Rust strings.
//!
//! # Codec Rules
//! - Bytes 0x80-0x9F decode through a fixed substitution table
//! - Every other byte decodes to the code point of the same value
//! - Encoding refuses text containing U+FFFD (an earlier decode already lost data)
//! - Code points without a byte of their own are truncated to their low 8 bits

use base64::Engine;
use once_cell::sync::Lazy;

use crate::error::{CompatError, Result};

/// Windows-1252 characters for bytes 0x80..=0x9F.
///
/// The five slots Windows-1252 leaves undefined (0x81, 0x8D, 0x8F, 0x90, 0x9D)
/// decode to their own code point, as MySQL does.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// Code points below this bound are looked up in the inverse table.
pub const ENCODE_TABLE_BOUND: usize = 0x2400;

static ENCODE_TABLE: Lazy<Box<[u8]>> = Lazy::new(|| {
    // low 8 bits unless a substitution claims the code point
    let mut table: Vec<u8> = (0..ENCODE_TABLE_BOUND).map(|cp| (cp & 0xFF) as u8).collect();
    for (offset, ch) in CP1252_HIGH.iter().enumerate() {
        table[*ch as usize] = 0x80 + offset as u8;
    }
    table.into_boxed_slice()
});

/// Decode a single latin1 byte
#[must_use]
pub fn decode_byte(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

/// Decode latin1 bytes; the result always has one char per input byte
#[must_use]
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| decode_byte(b)).collect()
}

/// Encode text as latin1 bytes
///
/// Fails with `EncodingCorruption` if the text contains U+FFFD. No bytes are
/// produced in that case, not even for the valid prefix.
pub fn encode(text: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(text.len());

    for (offset, ch) in text.chars().enumerate() {
        if ch == char::REPLACEMENT_CHARACTER {
            return Err(CompatError::EncodingCorruption { offset });
        }
        bytes.push(encode_char(ch));
    }

    Ok(bytes)
}

fn encode_char(ch: char) -> u8 {
    let cp = ch as usize;
    if cp < ENCODE_TABLE_BOUND {
        ENCODE_TABLE[cp]
    } else {
        (cp & 0xFF) as u8
    }
}

/// Character set used to turn result-column bytes into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8; invalid sequences become U+FFFD
    #[default]
    Utf8,
    /// MySQL latin1 (ISO-8859-1 with the Windows-1252 overlay)
    Latin1,
    /// Raw bytes, rendered as Base64 text
    Binary,
}

impl Charset {
    /// Resolve a charset from a MySQL or Java-style encoding name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" | "utf8mb3" | "utf8mb4" => Some(Self::Utf8),
            "latin1" | "cp1252" | "windows-1252" | "iso8859_1" | "iso-8859-1" => Some(Self::Latin1),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }

    /// Decode column bytes in this charset
    #[must_use]
    pub fn decode_column(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => decode(bytes),
            Self::Binary => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}
