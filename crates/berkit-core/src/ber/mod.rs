//! Octet-level BER/DER codecs.
//!
//! This module knows nothing about trees. It provides:
//!
//! - [`header`]: identifier and length octets, zero-copy element views
//! - [`primitive`]: BOOLEAN, INTEGER, BIT STRING, OCTET STRING, NULL
//! - [`oid`]: OBJECT IDENTIFIER
//! - [`time`]: UTCTime and GeneralizedTime
//!
//! ## Element Layout
//!
//! Each element is a TLV triplet: identifier octets (class, primitive or
//! constructed, tag number), length octets (short, long or indefinite
//! form), then the content octets. Constructed content is itself a run of
//! elements; an indefinite run is closed by the end-of-contents element
//! `00 00`.

pub mod header;
pub mod oid;
pub mod primitive;
pub mod time;

pub use header::{
    compute_tag_length, header_bytes, open_element, set_tag, universal_name, Class, Element,
    Encoding, Header, LengthForm,
};
pub use oid::{decode_oid, encode_oid, Oid};
pub use primitive::{
    decode_bit_string, decode_boolean, decode_integer, decode_integer_short, decode_null,
    decode_octet_string, encode_bit_string, encode_boolean, encode_integer, encode_integer_short,
    encode_null, encode_octet_string, BitString,
};
pub use time::{
    decode_generalized_time, decode_utc_time, encode_generalized_time, encode_utc_time, Time,
    Zone,
};

/// Universal tag numbers used by this crate
pub mod tag {
    /// End-of-contents marker
    pub const END_OF_CONTENTS: u32 = 0;
    /// BOOLEAN
    pub const BOOLEAN: u32 = 1;
    /// INTEGER
    pub const INTEGER: u32 = 2;
    /// BIT STRING
    pub const BIT_STRING: u32 = 3;
    /// OCTET STRING
    pub const OCTET_STRING: u32 = 4;
    /// NULL
    pub const NULL: u32 = 5;
    /// OBJECT IDENTIFIER
    pub const OBJECT_IDENTIFIER: u32 = 6;
    /// ENUMERATED
    pub const ENUMERATED: u32 = 10;
    /// SEQUENCE and SEQUENCE OF
    pub const SEQUENCE: u32 = 16;
    /// SET and SET OF
    pub const SET: u32 = 17;
    /// NumericString
    pub const NUMERIC_STRING: u32 = 18;
    /// PrintableString
    pub const PRINTABLE_STRING: u32 = 19;
    /// TeletexString
    pub const TELETEX_STRING: u32 = 20;
    /// IA5String
    pub const IA5_STRING: u32 = 22;
    /// UTCTime
    pub const UTC_TIME: u32 = 23;
    /// GeneralizedTime
    pub const GENERALIZED_TIME: u32 = 24;
    /// GraphicString
    pub const GRAPHIC_STRING: u32 = 25;
    /// VisibleString
    pub const VISIBLE_STRING: u32 = 26;
    /// GeneralString
    pub const GENERAL_STRING: u32 = 27;
    /// UniversalString
    pub const UNIVERSAL_STRING: u32 = 28;
    /// CHARACTER STRING
    pub const UNRESTRICTED_STRING: u32 = 29;
    /// BMPString
    pub const BMP_STRING: u32 = 30;
}
