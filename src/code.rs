//! Canonical codes
//!
//! The public id of a nucleus is its normalized name read as one big-endian
//! integer and written in base 62. The mapping is reversible, so two distinct
//! names can never share a code.

use crate::error::{NucleusError, Result};

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn digit_value(symbol: u8) -> Option<u32> {
    match symbol {
        b'0'..=b'9' => Some((symbol - b'0') as u32),
        b'A'..=b'Z' => Some((symbol - b'A') as u32 + 10),
        b'a'..=b'z' => Some((symbol - b'a') as u32 + 36),
        _ => None,
    }
}

/// Encode text as a base-62 integer, most significant digit first.
///
/// Empty text (the integer zero) encodes to "0".
pub fn encode_base62(text: &str) -> String {
    // big-endian base-256 digits, leading zeros stripped
    let mut number: Vec<u8> = text
        .as_bytes()
        .iter()
        .copied()
        .skip_while(|b| *b == 0)
        .collect();

    if number.is_empty() {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while !number.is_empty() {
        let mut quotient = Vec::with_capacity(number.len());
        let mut remainder: u32 = 0;
        for byte in &number {
            let acc = (remainder << 8) | *byte as u32;
            let q = acc / 62;
            remainder = acc % 62;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q as u8);
            }
        }
        digits.push(BASE62_ALPHABET[remainder as usize]);
        number = quotient;
    }

    digits.reverse();
    // alphabet is ASCII
    digits.into_iter().map(char::from).collect()
}

/// Decode a base-62 code back into the text it was produced from.
pub fn decode_base62(code: &str) -> Result<String> {
    if code.is_empty() {
        return Err(NucleusError::InvalidCode("code is empty".to_string()));
    }

    // little-endian base-256 accumulator
    let mut number: Vec<u8> = Vec::new();
    for symbol in code.bytes() {
        let value = digit_value(symbol).ok_or_else(|| {
            NucleusError::InvalidCode(format!(
                "'{}' is not a base-62 digit in '{}'",
                symbol as char, code
            ))
        })?;

        let mut carry = value;
        for byte in number.iter_mut() {
            let acc = *byte as u32 * 62 + carry;
            *byte = (acc & 0xff) as u8;
            carry = acc >> 8;
        }
        while carry > 0 {
            number.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    number.reverse();
    String::from_utf8(number)
        .map_err(|e| NucleusError::InvalidCode(format!("'{}' does not decode to UTF-8: {}", code, e)))
}

/// Canonical code for an already-normalized name.
pub fn generate_nucleus_code(normalized_name: &str) -> String {
    encode_base62(normalized_name)
}
