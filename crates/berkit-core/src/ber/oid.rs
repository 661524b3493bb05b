//! OBJECT IDENTIFIER codec.
//!
//! The first two arcs share one subidentifier (`arc0 * 40 + arc1`); every
//! subidentifier is written in base-128 with the continuation bit set on
//! all but its last octet.

use super::header::{base128_len, write_base128};
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// An object identifier as a list of arcs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid {
    arcs: Vec<u64>,
}

impl Oid {
    /// Creates an OID, checking the constraints on the first two arcs
    pub fn new(arcs: &[u64]) -> Result<Self> {
        match arcs {
            [] | [_] => Err(Error::invalid_content(
                "object-identifier",
                "at least two arcs are required",
            )),
            [first, ..] if *first > 2 => Err(Error::invalid_content(
                "object-identifier",
                format!("first arc {} is not 0, 1 or 2", first),
            )),
            [first, second, ..] if *first < 2 && *second >= 40 => Err(Error::invalid_content(
                "object-identifier",
                format!("second arc {} must be below 40 under arc {}", second, first),
            )),
            [2, second, ..] if second.checked_add(80).is_none() => Err(Error::invalid_content(
                "object-identifier",
                "second arc too large",
            )),
            _ => Ok(Self {
                arcs: arcs.to_vec(),
            }),
        }
    }

    /// The arcs, root first
    pub fn arcs(&self) -> &[u64] {
        &self.arcs
    }

    /// Encodes the content octets
    pub fn encode(&self) -> Vec<u8> {
        encode_oid(self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.arcs.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let arcs = s
            .split('.')
            .map(|part| {
                part.parse::<u64>().map_err(|_| {
                    Error::invalid_content("object-identifier", format!("bad arc '{}'", part))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Oid::new(&arcs)
    }
}

/// Encodes an OID's content octets
pub fn encode_oid(oid: &Oid) -> Vec<u8> {
    let first = oid.arcs[0] * 40 + oid.arcs[1];
    let subidentifiers = std::iter::once(first).chain(oid.arcs[2..].iter().copied());

    let mut out = Vec::new();
    for value in subidentifiers {
        let start = out.len();
        out.resize(start + base128_len(value), 0);
        write_base128(value, &mut out[start..]);
    }
    out
}

/// Decodes an OID from its content octets
pub fn decode_oid(content: &[u8]) -> Result<Oid> {
    if content.is_empty() {
        return Err(Error::invalid_content("object-identifier", "empty content"));
    }

    let mut subidentifiers = Vec::new();
    let mut value: u64 = 0;
    let mut fresh = true;
    for (i, &octet) in content.iter().enumerate() {
        if fresh && octet == 0x80 {
            return Err(Error::invalid_content(
                "object-identifier",
                format!("subidentifier at octet {} has a leading zero digit", i),
            ));
        }
        if value > (u64::MAX >> 7) {
            return Err(Error::invalid_content(
                "object-identifier",
                "subidentifier exceeds 64 bits",
            ));
        }
        value = (value << 7) | u64::from(octet & 0x7F);
        fresh = octet & 0x80 == 0;
        if fresh {
            subidentifiers.push(value);
            value = 0;
        }
    }
    if !fresh {
        return Err(Error::invalid_content(
            "object-identifier",
            "last subidentifier is truncated",
        ));
    }

    let first = subidentifiers[0];
    let (arc0, arc1) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut arcs = Vec::with_capacity(subidentifiers.len() + 1);
    arcs.push(arc0);
    arcs.push(arc1);
    arcs.extend_from_slice(&subidentifiers[1..]);
    Ok(Oid { arcs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSA_ENCRYPTION: [u8; 9] = [0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];

    #[test]
    fn test_rsa_oid() {
        let oid = Oid::new(&[1, 2, 840, 113_549, 1, 1, 1]).unwrap();
        assert_eq!(oid.encode(), RSA_ENCRYPTION.to_vec());
        assert_eq!(decode_oid(&RSA_ENCRYPTION).unwrap(), oid);
        assert_eq!(oid.to_string(), "1.2.840.113549.1.1.1");
    }

    #[test]
    fn test_zero_arc() {
        let oid = Oid::new(&[0, 0, 0, 5]).unwrap();
        let encoded = oid.encode();
        assert_eq!(encoded, vec![0x00, 0x00, 0x05]);
        assert_eq!(decode_oid(&encoded).unwrap(), oid);
    }

    #[test]
    fn test_joint_iso_arc() {
        // 2.999.3 -> first subidentifier 1079 = 0x88 0x37
        let oid: Oid = "2.999.3".parse().unwrap();
        assert_eq!(oid.encode(), vec![0x88, 0x37, 0x03]);
        assert_eq!(decode_oid(&[0x88, 0x37, 0x03]).unwrap(), oid);
    }

    #[test]
    fn test_invalid_arcs() {
        assert!(Oid::new(&[1]).is_err());
        assert!(Oid::new(&[3, 1]).is_err());
        assert!(Oid::new(&[1, 40]).is_err());
        assert!("1.2.x".parse::<Oid>().is_err());
    }

    #[test]
    fn test_invalid_content() {
        assert!(decode_oid(&[]).is_err());
        assert!(decode_oid(&[0x2A, 0x86]).is_err());
        assert!(decode_oid(&[0x2A, 0x80, 0x01]).is_err());
    }
}
