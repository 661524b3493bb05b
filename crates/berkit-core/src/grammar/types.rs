//! Type registry for grammar commands.
//!
//! Every name a grammar may use maps to one [`TypeDescriptor`]: the
//! universal tag the type carries by default, how the interpreter treats
//! it, and for plain types the [`Codec`] turning [`Value`]s into content
//! octets and back.

use super::value::Value;
use crate::ber::{
    decode_bit_string, decode_boolean, decode_generalized_time, decode_integer,
    decode_integer_short, decode_null, decode_octet_string, decode_oid, decode_utc_time,
    encode_bit_string, encode_boolean, encode_generalized_time, encode_integer,
    encode_integer_short, encode_null, encode_octet_string, encode_oid, encode_utc_time, tag,
    Encoding,
};
use crate::error::{Error, Result};
use num_bigint::BigInt;

/// How the interpreter treats a grammar command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A concrete ASN.1 type
    Plain,
    /// Any element; passed through as a node
    Any,
    /// Exactly one of several alternatives
    Choice,
    /// A block of fields that is present as a whole or not at all
    Optional,
}

/// Content codec of a plain type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// BOOLEAN
    Boolean,
    /// INTEGER or ENUMERATED as a big integer
    Integer,
    /// INTEGER or ENUMERATED as an `i64`
    IntegerShort,
    /// BIT STRING
    BitString,
    /// OCTET STRING and the character string types
    OctetString,
    /// NULL
    Null,
    /// OBJECT IDENTIFIER
    ObjectIdentifier,
    /// UTCTime
    UtcTime,
    /// GeneralizedTime
    GeneralizedTime,
    /// SEQUENCE or SET; no content codec
    Constructed,
}

/// Registry entry for one grammar command name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Command name as written in grammar text
    pub name: &'static str,
    /// Universal tag number, 0 for pseudo-types
    pub tag: u32,
    /// Interpreter treatment
    pub kind: TypeKind,
    /// Content codec, meaningful for plain types only
    pub codec: Codec,
}

impl TypeDescriptor {
    const fn plain(name: &'static str, tag: u32, codec: Codec) -> Self {
        Self {
            name,
            tag,
            kind: TypeKind::Plain,
            codec,
        }
    }

    const fn pseudo(name: &'static str, kind: TypeKind) -> Self {
        Self {
            name,
            tag: 0,
            kind,
            codec: Codec::Constructed,
        }
    }

    /// True for SEQUENCE and SET
    pub fn is_constructed(&self) -> bool {
        self.kind == TypeKind::Plain && self.codec == Codec::Constructed
    }

    /// True for plain types carrying content octets
    pub fn is_leaf(&self) -> bool {
        self.kind == TypeKind::Plain && self.codec != Codec::Constructed
    }

    /// Encoding of elements of this type
    pub fn encoding(&self) -> Encoding {
        if self.is_constructed() {
            Encoding::Constructed
        } else {
            Encoding::Primitive
        }
    }
}

static TYPES: &[TypeDescriptor] = &[
    TypeDescriptor::plain("boolean", tag::BOOLEAN, Codec::Boolean),
    TypeDescriptor::plain("integer", tag::INTEGER, Codec::Integer),
    TypeDescriptor::plain("integer-short", tag::INTEGER, Codec::IntegerShort),
    TypeDescriptor::plain("bit-string", tag::BIT_STRING, Codec::BitString),
    TypeDescriptor::plain("octet-string", tag::OCTET_STRING, Codec::OctetString),
    TypeDescriptor::plain("null", tag::NULL, Codec::Null),
    TypeDescriptor::plain("object-identifier", tag::OBJECT_IDENTIFIER, Codec::ObjectIdentifier),
    TypeDescriptor::plain("enum", tag::ENUMERATED, Codec::Integer),
    TypeDescriptor::plain("enum-short", tag::ENUMERATED, Codec::IntegerShort),
    TypeDescriptor::plain("utf8-string", 12, Codec::OctetString),
    TypeDescriptor::plain("sequence", tag::SEQUENCE, Codec::Constructed),
    TypeDescriptor::plain("set", tag::SET, Codec::Constructed),
    TypeDescriptor::plain("numeric-string", tag::NUMERIC_STRING, Codec::OctetString),
    TypeDescriptor::plain("printable-string", tag::PRINTABLE_STRING, Codec::OctetString),
    TypeDescriptor::plain("teletex-string", tag::TELETEX_STRING, Codec::OctetString),
    TypeDescriptor::plain("ia5-string", tag::IA5_STRING, Codec::OctetString),
    TypeDescriptor::plain("utc-time", tag::UTC_TIME, Codec::UtcTime),
    TypeDescriptor::plain("generalized-time", tag::GENERALIZED_TIME, Codec::GeneralizedTime),
    TypeDescriptor::plain("graphic-string", tag::GRAPHIC_STRING, Codec::OctetString),
    TypeDescriptor::plain("visible-string", tag::VISIBLE_STRING, Codec::OctetString),
    TypeDescriptor::plain("general-string", tag::GENERAL_STRING, Codec::OctetString),
    TypeDescriptor::plain("universal-string", tag::UNIVERSAL_STRING, Codec::OctetString),
    TypeDescriptor::plain("unrestricted-string", tag::UNRESTRICTED_STRING, Codec::OctetString),
    TypeDescriptor::plain("bmp-string", tag::BMP_STRING, Codec::OctetString),
    TypeDescriptor::pseudo("any", TypeKind::Any),
    TypeDescriptor::pseudo("choice", TypeKind::Choice),
    TypeDescriptor::pseudo("optional", TypeKind::Optional),
];

/// Looks up a command name
pub fn lookup(name: &str) -> Option<&'static TypeDescriptor> {
    TYPES.iter().find(|descriptor| descriptor.name == name)
}

/// Every registered descriptor, in registration order
pub fn all() -> &'static [TypeDescriptor] {
    TYPES
}

impl Codec {
    /// Name of the [`Value`] variant this codec consumes and produces
    pub fn value_kind(self) -> &'static str {
        match self {
            Codec::Boolean => "boolean",
            Codec::Integer => "integer",
            Codec::IntegerShort => "short integer",
            Codec::BitString => "bit string",
            Codec::OctetString => "octet string",
            Codec::Null => "null",
            Codec::ObjectIdentifier => "object identifier",
            Codec::UtcTime | Codec::GeneralizedTime => "time",
            Codec::Constructed => "nothing",
        }
    }

    /// Encodes a build argument into content octets
    ///
    /// Returns `None` when the value has the wrong variant.
    pub fn encode(self, value: &Value) -> Option<Result<Vec<u8>>> {
        let content = match (self, value) {
            (Codec::Boolean, Value::Boolean(b)) => encode_boolean(*b),
            (Codec::Integer, Value::Integer(i)) => encode_integer(i),
            (Codec::Integer, Value::Short(i)) => encode_integer(&BigInt::from(*i)),
            (Codec::IntegerShort, Value::Short(i)) => encode_integer_short(*i),
            (Codec::IntegerShort, Value::Integer(i)) => encode_integer(i),
            (Codec::BitString, Value::BitString(bits)) => encode_bit_string(bits),
            (Codec::OctetString, Value::OctetString(bytes)) => encode_octet_string(bytes),
            (Codec::Null, Value::Null) => encode_null(),
            (Codec::ObjectIdentifier, Value::Oid(oid)) => encode_oid(oid),
            (Codec::UtcTime, Value::Time(time)) => return Some(encode_utc_time(time)),
            (Codec::GeneralizedTime, Value::Time(time)) => {
                return Some(encode_generalized_time(time))
            }
            _ => return None,
        };
        Some(Ok(content))
    }

    /// Decodes content octets into an output slot value
    pub fn decode(self, content: &[u8]) -> Result<Value> {
        Ok(match self {
            Codec::Boolean => Value::Boolean(decode_boolean(content)?),
            Codec::Integer => Value::Integer(decode_integer(content)?),
            Codec::IntegerShort => Value::Short(decode_integer_short(content)?),
            Codec::BitString => Value::BitString(decode_bit_string(content)?),
            Codec::OctetString => Value::OctetString(decode_octet_string(content)),
            Codec::Null => {
                decode_null(content)?;
                Value::Null
            }
            Codec::ObjectIdentifier => Value::Oid(decode_oid(content)?),
            Codec::UtcTime => Value::Time(decode_utc_time(content)?),
            Codec::GeneralizedTime => Value::Time(decode_generalized_time(content)?),
            Codec::Constructed => {
                return Err(Error::type_mismatch("primitive type", "constructed type"))
            }
        })
    }

    /// Checks content octets without producing a value
    pub fn skip(self, content: &[u8]) -> Result<()> {
        match self {
            Codec::OctetString => Ok(()),
            Codec::Null => decode_null(content),
            _ => self.decode(content).map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::Oid;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup() {
        let descriptor = lookup("object-identifier").unwrap();
        assert_eq!(descriptor.tag, tag::OBJECT_IDENTIFIER);
        assert_eq!(descriptor.kind, TypeKind::Plain);
        assert!(descriptor.is_leaf());

        let set = lookup("set").unwrap();
        assert!(set.is_constructed());
        assert_eq!(set.encoding(), Encoding::Constructed);

        assert_eq!(lookup("choice").unwrap().kind, TypeKind::Choice);
        assert_eq!(lookup("any").unwrap().tag, 0);
        assert!(lookup("sequence-of").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        for (i, a) in all().iter().enumerate() {
            assert!(all()[i + 1..].iter().all(|b| b.name != a.name), "{}", a.name);
        }
    }

    #[test]
    fn test_codec_encode() {
        assert_eq!(
            Codec::Integer.encode(&Value::Short(128)).unwrap().unwrap(),
            vec![0x00, 0x80]
        );
        assert_eq!(
            Codec::ObjectIdentifier
                .encode(&Value::Oid(Oid::new(&[1, 2]).unwrap()))
                .unwrap()
                .unwrap(),
            vec![0x2A]
        );
        assert!(Codec::Boolean.encode(&Value::Null).is_none());
    }

    #[test]
    fn test_codec_decode() {
        assert_eq!(Codec::Boolean.decode(&[0xFF]).unwrap(), Value::Boolean(true));
        assert_eq!(Codec::IntegerShort.decode(&[0xFF, 0x7F]).unwrap(), Value::Short(-129));
        assert_eq!(Codec::Null.decode(&[]).unwrap(), Value::Null);
        assert!(Codec::Null.decode(&[0x00]).is_err());
        assert!(Codec::Constructed.decode(&[]).is_err());
        assert!(Codec::OctetString.skip(&[1, 2, 3]).is_ok());
    }
}
