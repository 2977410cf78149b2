//! Validation operators (@validateUrlEncoding, @validateByteRange).
//!
//! These match when the value is *invalid*.

use super::traits::{Operator, OperatorResult};
use crate::error::{Error, Result};

/// URL encoding validation operator (@validateUrlEncoding).
pub struct ValidateUrlEncodingOperator;

impl Operator for ValidateUrlEncodingOperator {
    fn execute(&self, value: &str) -> OperatorResult {
        if is_valid_url_encoding(value) {
            OperatorResult::no_match()
        } else {
            OperatorResult::matched(value)
        }
    }

    fn name(&self) -> &'static str {
        "validateUrlEncoding"
    }
}

/// Check that every `%` is followed by two hex digits.
fn is_valid_url_encoding(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            match bytes.get(i + 1..i + 3) {
                Some([h1, h2]) if h1.is_ascii_hexdigit() && h2.is_ascii_hexdigit() => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}

/// Byte range validation operator (@validateByteRange).
pub struct ValidateByteRangeOperator {
    ranges: Vec<(u8, u8)>,
}

impl ValidateByteRangeOperator {
    /// Parse ranges like `9,10,13,32-126`.
    pub fn new(spec: &str) -> Result<Self> {
        let invalid = |part: &str| Error::InvalidOperatorArgument {
            operator: "validateByteRange".to_string(),
            message: format!("invalid range '{}'", part),
        };

        let mut ranges = Vec::new();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let range = match part.split_once('-') {
                Some((start, end)) => {
                    let start: u8 = start.trim().parse().map_err(|_| invalid(part))?;
                    let end: u8 = end.trim().parse().map_err(|_| invalid(part))?;
                    if start > end {
                        return Err(invalid(part));
                    }
                    (start, end)
                }
                None => {
                    let byte: u8 = part.parse().map_err(|_| invalid(part))?;
                    (byte, byte)
                }
            };
            ranges.push(range);
        }

        if ranges.is_empty() {
            return Err(invalid(spec));
        }
        Ok(Self { ranges })
    }
}

impl Operator for ValidateByteRangeOperator {
    fn execute(&self, value: &str) -> OperatorResult {
        for byte in value.bytes() {
            if !self.ranges.iter().any(|(start, end)| (*start..=*end).contains(&byte)) {
                return OperatorResult::matched(format!("invalid byte: {}", byte));
            }
        }
        OperatorResult::no_match()
    }

    fn name(&self) -> &'static str {
        "validateByteRange"
    }
}
