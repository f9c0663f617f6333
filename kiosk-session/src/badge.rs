//! Badge frame decoding
//!
//! A scanner frame is one ASCII line of `|`-delimited fields; the first field
//! is the registrant identifier. Decoding is a pure parse step.

/// Field separator used by the badge printer
pub const DEFAULT_DELIMITER: char = '|';

/// Parses raw scanner frames into registrant ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeDecoder {
    delimiter: char,
}

impl Default for BadgeDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl BadgeDecoder {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Decode a text frame; `None` when no id is present
    pub fn decode(&self, raw: &str) -> Option<String> {
        let first = raw.trim().split(self.delimiter).next()?.trim();
        if first.is_empty() {
            None
        } else {
            Some(first.to_string())
        }
    }
}

/// Decode with the default delimiter
pub fn decode_badge(raw: &str) -> Option<String> {
    BadgeDecoder::default().decode(raw)
}
