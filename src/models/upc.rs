//! UPC-A handling
//!
//! The portal prints UPCs inconsistently (dashes, missing leading zeros,
//! sometimes without the check digit). [`Upc`] normalizes them to the
//! canonical 12-digit form and knows how to compute and verify the check
//! digit so exports carry scannable codes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A normalized 12-digit UPC-A
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Upc(String);

impl Upc {
    /// Normalize portal-printed text into a 12-digit UPC
    ///
    /// Strips every non-digit, left-pads with zeros to 12 digits. Inputs
    /// with no digits or more than 12 digits are rejected. The check digit
    /// is not verified here; use [`Upc::is_valid`].
    pub fn parse(input: &str) -> Result<Self> {
        let digits: String = input.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(Error::Other(format!("no digits in UPC input {input:?}")));
        }
        if digits.len() > 12 {
            return Err(Error::Other(format!(
                "UPC input {input:?} has {} digits, at most 12 allowed",
                digits.len()
            )));
        }
        Ok(Self(format!("{digits:0>12}")))
    }

    /// Build a full UPC from an 11-digit (or shorter) item code by
    /// computing the check digit
    pub fn with_check_digit(code: &str) -> Result<Self> {
        let digits: String = code.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() || digits.len() > 11 {
            return Err(Error::Other(format!(
                "item code {code:?} must have 1 to 11 digits"
            )));
        }
        let body = format!("{digits:0>11}");
        let check = check_digit(&body);
        Ok(Self(format!("{body}{check}")))
    }

    /// The canonical 12-digit form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the last digit matches the computed check digit
    pub fn is_valid(&self) -> bool {
        let body = &self.0[..11];
        let last = self.0.as_bytes()[11] - b'0';
        check_digit(body) == last
    }

    /// The 11-digit body without the check digit
    pub fn without_check_digit(&self) -> &str {
        &self.0[..11]
    }
}

impl std::fmt::Display for Upc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UPC-A check digit over an 11-digit body
///
/// Odd positions (1-based) weigh 3, even positions weigh 1; the check digit
/// brings the total to a multiple of ten.
fn check_digit(body: &str) -> u8 {
    let mut odd_sum = 0u32;
    let mut even_sum = 0u32;
    for (index, ch) in body.bytes().enumerate() {
        let digit = u32::from(ch - b'0');
        if (index + 1) % 2 == 0 {
            even_sum += digit;
        } else {
            odd_sum += digit;
        }
    }
    let modulo = (odd_sum * 3 + even_sum) % 10;
    ((10 - modulo) % 10) as u8
}
