//! Content codecs for the primitive universal types.
//!
//! Encoders return the content octets only; the identifier and length
//! octets are the header codec's business. Decoders take the content view
//! of an element and never look at its header.

use crate::error::{Error, Result};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{ToPrimitive, Zero};

/// Encodes a BOOLEAN as `0xFF` or `0x00`
pub fn encode_boolean(value: bool) -> Vec<u8> {
    vec![if value { 0xFF } else { 0x00 }]
}

/// Decodes a BOOLEAN; any non-zero octet is true
pub fn decode_boolean(content: &[u8]) -> Result<bool> {
    match content {
        [octet] => Ok(*octet != 0),
        _ => Err(Error::invalid_content(
            "boolean",
            format!("expected 1 octet, found {}", content.len()),
        )),
    }
}

/// Encodes an INTEGER as minimal big-endian two's complement
///
/// A guard octet (`0x00` or `0xFF`) is prepended whenever the leading bit
/// of the natural encoding disagrees with the sign, so 128 becomes
/// `00 80` and -128 stays `80`.
pub fn encode_integer(value: &BigInt) -> Vec<u8> {
    match value.sign() {
        Sign::NoSign => vec![0x00],
        Sign::Plus => {
            let mut out = value.magnitude().to_bytes_be();
            if out[0] & 0x80 != 0 {
                out.insert(0, 0x00);
            }
            out
        }
        Sign::Minus => {
            // -n in two's complement is the bitwise inverse of n - 1
            let reduced: BigUint = value.magnitude().clone() - 1u32;
            let mut out: Vec<u8> = if reduced.is_zero() {
                Vec::new()
            } else {
                reduced.to_bytes_be().iter().map(|octet| !octet).collect()
            };
            if out.first().map_or(true, |octet| octet & 0x80 == 0) {
                out.insert(0, 0xFF);
            }
            out
        }
    }
}

/// Decodes an INTEGER from big-endian two's complement
pub fn decode_integer(content: &[u8]) -> Result<BigInt> {
    let Some(&first) = content.first() else {
        return Err(Error::invalid_content("integer", "empty content"));
    };

    if first & 0x80 == 0 {
        return Ok(BigInt::from_bytes_be(Sign::Plus, content));
    }

    // Negative: invert, add one, negate
    let inverted: Vec<u8> = content.iter().map(|octet| !octet).collect();
    let magnitude = BigUint::from_bytes_be(&inverted) + 1u32;
    Ok(BigInt::from_biguint(Sign::Minus, magnitude))
}

/// Encodes a machine-sized INTEGER
pub fn encode_integer_short(value: i64) -> Vec<u8> {
    encode_integer(&BigInt::from(value))
}

/// Decodes an INTEGER that must fit in 64 bits
pub fn decode_integer_short(content: &[u8]) -> Result<i64> {
    decode_integer(content)?
        .to_i64()
        .ok_or_else(|| Error::invalid_content("integer", "value does not fit in 64 bits"))
}

/// A BIT STRING value: payload octets plus the count of unused trailing bits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BitString {
    unused_bits: u8,
    data: Vec<u8>,
}

impl BitString {
    /// Creates a bit string, validating the unused-bit count
    pub fn new(data: Vec<u8>, unused_bits: u8) -> Result<Self> {
        if unused_bits > 7 {
            return Err(Error::invalid_content(
                "bit-string",
                format!("{} unused bits", unused_bits),
            ));
        }
        if data.is_empty() && unused_bits != 0 {
            return Err(Error::invalid_content(
                "bit-string",
                "unused bits declared on an empty payload",
            ));
        }
        Ok(Self { unused_bits, data })
    }

    /// Creates a bit string whose length is a whole number of octets
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            unused_bits: 0,
            data: data.into(),
        }
    }

    /// Payload octets, including the padding bits of the final octet
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Count of unused low-order bits in the final octet
    pub fn unused_bits(&self) -> u8 {
        self.unused_bits
    }

    /// Number of significant bits
    pub fn bit_len(&self) -> usize {
        self.data.len() * 8 - usize::from(self.unused_bits)
    }

    /// Value of bit `index`, counting from the most significant bit
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.bit_len() {
            return None;
        }
        Some(self.data[index / 8] & (0x80 >> (index % 8)) != 0)
    }
}

/// Encodes a BIT STRING; padding bits are written as zero
pub fn encode_bit_string(value: &BitString) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.data.len() + 1);
    out.push(value.unused_bits);
    out.extend_from_slice(&value.data);
    if let Some(last) = out.last_mut().filter(|_| !value.data.is_empty()) {
        *last &= 0xFF << value.unused_bits;
    }
    out
}

/// Decodes a BIT STRING
pub fn decode_bit_string(content: &[u8]) -> Result<BitString> {
    let Some((&unused, data)) = content.split_first() else {
        return Err(Error::invalid_content("bit-string", "missing unused-bits octet"));
    };
    BitString::new(data.to_vec(), unused)
}

/// Encodes an OCTET STRING (and every string type sharing its rules)
pub fn encode_octet_string(value: &[u8]) -> Vec<u8> {
    value.to_vec()
}

/// Decodes an OCTET STRING
pub fn decode_octet_string(content: &[u8]) -> Vec<u8> {
    content.to_vec()
}

/// Encodes NULL
pub fn encode_null() -> Vec<u8> {
    Vec::new()
}

/// Decodes NULL, which must have empty content
pub fn decode_null(content: &[u8]) -> Result<()> {
    if content.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid_content(
            "null",
            format!("expected no content, found {} octets", content.len()),
        ))
    }
}
