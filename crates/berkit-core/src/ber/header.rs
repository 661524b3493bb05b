//! Identifier and length octets.
//!
//! Layout of one element header (ITU-T X.690 §8.1):
//!
//! ```text
//! identifier:  C C P T T T T T            tag < 31
//!              C C P 1 1 1 1 1  1xxxxxxx ... 0xxxxxxx    tag >= 31
//! length:      0 L L L L L L L            short form, < 128
//!              1 N N N N N N N  <N bytes big-endian>     long form
//!              1 0 0 0 0 0 0 0            indefinite
//! ```
//!
//! Decoding never copies: [`open_element`] hands back ranges into the
//! caller's buffer.

use crate::error::{Error, Result};
use std::ops::Range;
use tracing::trace;

/// Tag class, bits 8-7 of the identifier octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Class {
    /// Types defined by X.680 itself
    #[default]
    Universal = 0,
    /// Application-wide types
    Application = 1,
    /// Context-specific tags inside a SEQUENCE, SET or CHOICE
    Context = 2,
    /// Private use
    Private = 3,
}

impl Class {
    /// Extracts the class from an identifier octet
    pub fn from_identifier(octet: u8) -> Self {
        match octet >> 6 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::Context,
            _ => Class::Private,
        }
    }

    /// Class bits positioned for an identifier octet
    pub fn to_bits(self) -> u8 {
        (self as u8) << 6
    }

    /// Short label used in dumps
    pub fn as_str(&self) -> &'static str {
        match self {
            Class::Universal => "UNIVERSAL",
            Class::Application => "APPLICATION",
            Class::Context => "CONTEXT",
            Class::Private => "PRIVATE",
        }
    }
}

/// Primitive/constructed flag, bit 6 of the identifier octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// Content is raw octets
    #[default]
    Primitive,
    /// Content is a chain of nested elements
    Constructed,
}

impl Encoding {
    fn to_bit(self) -> u8 {
        match self {
            Encoding::Primitive => 0x00,
            Encoding::Constructed => 0x20,
        }
    }
}

/// How the end of the content octets is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LengthForm {
    /// Length is stated up front
    #[default]
    Definite,
    /// Content runs until an end-of-contents element (`00 00`)
    Indefinite,
}

/// Everything the identifier and length octets say about one element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Header {
    /// Tag class
    pub class: Class,
    /// Primitive or constructed
    pub encoding: Encoding,
    /// Tag number
    pub tag: u32,
    /// Definite or indefinite length
    pub length_form: LengthForm,
    /// Content octet count; ignored when writing an indefinite header
    pub content_len: usize,
}

impl Header {
    /// Creates a definite-length header with empty content
    pub fn new(class: Class, encoding: Encoding, tag: u32) -> Self {
        Self {
            class,
            encoding,
            tag,
            length_form: LengthForm::Definite,
            content_len: 0,
        }
    }

    /// Creates a universal-class header
    pub fn universal(encoding: Encoding, tag: u32) -> Self {
        Self::new(Class::Universal, encoding, tag)
    }

    /// Sets the content length
    pub fn with_content_len(mut self, len: usize) -> Self {
        self.content_len = len;
        self
    }

    /// Sets the length form
    pub fn with_length_form(mut self, form: LengthForm) -> Self {
        self.length_form = form;
        self
    }

    /// True for the `00 00` element closing an indefinite-length run
    pub fn is_end_of_contents(&self) -> bool {
        self.class == Class::Universal
            && self.encoding == Encoding::Primitive
            && self.tag == 0
            && self.length_form == LengthForm::Definite
            && self.content_len == 0
    }

    /// True if the element is constructed
    pub fn is_constructed(&self) -> bool {
        self.encoding == Encoding::Constructed
    }
}

/// A header located inside a source buffer, with views on its octets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Decoded header
    pub header: Header,
    /// Range of the identifier and length octets
    pub tag_range: Range<usize>,
    /// Range of the content octets
    ///
    /// For indefinite-length elements this runs to the end of the source;
    /// the tree decoder narrows it once the end-of-contents marker is seen.
    pub content: Range<usize>,
}

impl Element {
    /// Offset of the first identifier octet
    pub fn start(&self) -> usize {
        self.tag_range.start
    }

    /// Offset one past the last content octet
    pub fn end(&self) -> usize {
        self.content.end
    }
}

/// Number of base-128 digits needed for `value`
pub(crate) fn base128_len(value: u64) -> usize {
    let mut len = 1;
    let mut rest = value >> 7;
    while rest > 0 {
        len += 1;
        rest >>= 7;
    }
    len
}

/// Writes `value` in base-128 with the continuation bit on all but the last
/// octet. The caller guarantees room for [`base128_len`] octets.
pub(crate) fn write_base128(value: u64, out: &mut [u8]) -> usize {
    let len = base128_len(value);
    for (i, slot) in out.iter_mut().take(len).enumerate() {
        let shift = 7 * (len - 1 - i);
        let mut octet = ((value >> shift) & 0x7F) as u8;
        if i + 1 < len {
            octet |= 0x80;
        }
        *slot = octet;
    }
    len
}

fn length_octets(len: usize) -> usize {
    ((usize::BITS - len.leading_zeros()).div_ceil(8)) as usize
}

/// Size of the identifier plus length octets for `header`
pub fn compute_tag_length(header: &Header) -> usize {
    let identifier = if header.tag < 31 {
        1
    } else {
        1 + base128_len(u64::from(header.tag))
    };
    let length = match header.length_form {
        LengthForm::Indefinite => 1,
        LengthForm::Definite if header.content_len < 128 => 1,
        LengthForm::Definite => 1 + length_octets(header.content_len),
    };
    identifier + length
}

/// Writes the identifier and length octets of `header` into `out`
///
/// Returns the number of octets written.
pub fn set_tag(header: &Header, out: &mut [u8]) -> Result<usize> {
    let needed = compute_tag_length(header);
    if out.len() < needed {
        return Err(Error::buffer_too_small(needed, out.len()));
    }

    let lead = header.class.to_bits() | header.encoding.to_bit();
    let mut pos = 1;
    if header.tag < 31 {
        out[0] = lead | header.tag as u8;
    } else {
        out[0] = lead | 0x1F;
        pos += write_base128(u64::from(header.tag), &mut out[1..]);
    }

    match header.length_form {
        LengthForm::Indefinite => out[pos] = 0x80,
        LengthForm::Definite if header.content_len < 128 => out[pos] = header.content_len as u8,
        LengthForm::Definite => {
            let count = length_octets(header.content_len);
            out[pos] = 0x80 | count as u8;
            for i in 0..count {
                out[pos + 1 + i] = (header.content_len >> (8 * (count - 1 - i))) as u8;
            }
        }
    }

    Ok(needed)
}

/// Renders the identifier and length octets into a fresh vector
pub fn header_bytes(header: &Header) -> Vec<u8> {
    let mut out = vec![0u8; compute_tag_length(header)];
    // Sized by compute_tag_length, so set_tag cannot run short.
    let written = set_tag(header, &mut out).unwrap_or(0);
    out.truncate(written);
    out
}

fn read_octet(buf: &[u8], pos: usize, start: usize) -> Result<u8> {
    buf.get(pos).copied().ok_or(Error::BufferOverflow {
        offset: start,
        needed: pos - start + 1,
        available: buf.len().saturating_sub(start),
    })
}

/// Parses the header of the element starting at `offset` in `buf`
///
/// Validates that the claimed content fits inside `buf` and returns views
/// rather than copies.
pub fn open_element(buf: &[u8], offset: usize) -> Result<Element> {
    let first = read_octet(buf, offset, offset)?;
    let class = Class::from_identifier(first);
    let encoding = if first & 0x20 != 0 {
        Encoding::Constructed
    } else {
        Encoding::Primitive
    };

    let mut pos = offset + 1;
    let tag = if first & 0x1F != 0x1F {
        u32::from(first & 0x1F)
    } else {
        let mut value: u32 = 0;
        let mut digits = 0;
        loop {
            let octet = read_octet(buf, pos, offset)?;
            pos += 1;
            if digits == 0 && octet == 0x80 {
                return Err(Error::invalid_header(offset, "tag number has a leading zero digit"));
            }
            if value > (u32::MAX >> 7) {
                return Err(Error::invalid_header(offset, "tag number exceeds 32 bits"));
            }
            value = (value << 7) | u32::from(octet & 0x7F);
            digits += 1;
            if octet & 0x80 == 0 {
                break;
            }
        }
        value
    };

    let size = read_octet(buf, pos, offset)?;
    pos += 1;
    let (length_form, content_len) = if size & 0x80 == 0 {
        (LengthForm::Definite, usize::from(size))
    } else if size == 0x80 {
        if encoding == Encoding::Primitive {
            return Err(Error::invalid_header(
                offset,
                "indefinite length on a primitive element",
            ));
        }
        (LengthForm::Indefinite, 0)
    } else if size == 0xFF {
        return Err(Error::invalid_header(offset, "reserved length octet 0xFF"));
    } else {
        let count = usize::from(size & 0x7F);
        if count > std::mem::size_of::<usize>() {
            return Err(Error::invalid_header(
                offset,
                format!("length uses {} octets", count),
            ));
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | usize::from(read_octet(buf, pos, offset)?);
            pos += 1;
        }
        (LengthForm::Definite, len)
    };

    let header = Header {
        class,
        encoding,
        tag,
        length_form,
        content_len,
    };
    let available = buf.len() - offset;
    let header_len = pos - offset;

    let content = match length_form {
        LengthForm::Indefinite => pos..buf.len(),
        LengthForm::Definite => {
            let needed = header_len
                .checked_add(content_len)
                .ok_or_else(|| Error::invalid_header(offset, "length overflows"))?;
            if needed > available {
                return Err(Error::BufferOverflow {
                    offset,
                    needed,
                    available,
                });
            }
            pos..pos + content_len
        }
    };

    trace!(
        "Opened {:?} {:?} tag {} at {} ({} header bytes)",
        class,
        encoding,
        tag,
        offset,
        header_len
    );

    Ok(Element {
        header,
        tag_range: offset..pos,
        content,
    })
}

/// Name of a universal tag number, if it has one
pub fn universal_name(tag: u32) -> Option<&'static str> {
    Some(match tag {
        0 => "END-OF-CONTENTS",
        1 => "BOOLEAN",
        2 => "INTEGER",
        3 => "BIT STRING",
        4 => "OCTET STRING",
        5 => "NULL",
        6 => "OBJECT IDENTIFIER",
        10 => "ENUMERATED",
        12 => "UTF8String",
        16 => "SEQUENCE",
        17 => "SET",
        18 => "NumericString",
        19 => "PrintableString",
        20 => "TeletexString",
        22 => "IA5String",
        23 => "UTCTime",
        24 => "GeneralizedTime",
        25 => "GraphicString",
        26 => "VisibleString",
        27 => "GeneralString",
        28 => "UniversalString",
        29 => "CHARACTER STRING",
        30 => "BMPString",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_header() {
        let header = Header::universal(Encoding::Primitive, 2).with_content_len(1);
        assert_eq!(compute_tag_length(&header), 2);
        assert_eq!(header_bytes(&header), vec![0x02, 0x01]);
    }

    #[test]
    fn test_high_tag_number() {
        let header = Header::new(Class::Context, Encoding::Constructed, 201).with_content_len(0);
        // 201 = 0b1_1001001 -> 0x81 0x49
        assert_eq!(header_bytes(&header), vec![0xBF, 0x81, 0x49, 0x00]);

        let elem = open_element(&[0xBF, 0x81, 0x49, 0x00], 0).unwrap();
        assert_eq!(elem.header, header);
        assert_eq!(elem.tag_range, 0..4);
    }

    #[test]
    fn test_long_form_length() {
        let header = Header::universal(Encoding::Primitive, 4).with_content_len(300);
        assert_eq!(compute_tag_length(&header), 4);
        assert_eq!(header_bytes(&header), vec![0x04, 0x82, 0x01, 0x2C]);

        let header = Header::universal(Encoding::Primitive, 4).with_content_len(128);
        assert_eq!(header_bytes(&header), vec![0x04, 0x81, 0x80]);
    }

    #[test]
    fn test_indefinite_header() {
        let header = Header::universal(Encoding::Constructed, 16)
            .with_length_form(LengthForm::Indefinite);
        assert_eq!(header_bytes(&header), vec![0x30, 0x80]);

        let data = [0x30, 0x80, 0x05, 0x00, 0x00, 0x00];
        let elem = open_element(&data, 0).unwrap();
        assert_eq!(elem.header.length_form, LengthForm::Indefinite);
        assert_eq!(elem.content, 2..6);
    }

    #[test]
    fn test_set_tag_too_small() {
        let header = Header::universal(Encoding::Primitive, 4).with_content_len(300);
        let mut out = [0u8; 3];
        assert_eq!(
            set_tag(&header, &mut out),
            Err(Error::BufferTooSmall {
                needed: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_tag_length_symmetry() {
        let classes = [Class::Universal, Class::Application, Class::Context, Class::Private];
        let encodings = [Encoding::Primitive, Encoding::Constructed];
        let tags = [0u32, 1, 30, 31, 127, 128, 16_383, 16_384, u32::MAX];
        let lengths = [0usize, 1, 127, 128, 255, 256, 65_535, 65_536];

        for class in classes {
            for encoding in encodings {
                for tag in tags {
                    for len in lengths {
                        let header = Header::new(class, encoding, tag).with_content_len(len);
                        let mut buf = header_bytes(&header);
                        buf.resize(buf.len() + len, 0);
                        let elem = open_element(&buf, 0).unwrap();
                        assert_eq!(elem.header, header);
                        assert_eq!(elem.content.len(), len);
                    }
                }
            }
        }
    }

    #[test]
    fn test_open_element_at_offset() {
        let data = [0xFF, 0xFF, 0x04, 0x02, 0xAA, 0xBB];
        let elem = open_element(&data, 2).unwrap();
        assert_eq!(elem.content, 4..6);
        assert_eq!(&data[elem.content.clone()], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_content_overflow() {
        let data = [0x04, 0x05, 0x01];
        assert_eq!(
            open_element(&data, 0),
            Err(Error::BufferOverflow {
                offset: 0,
                needed: 7,
                available: 3
            })
        );
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            open_element(&[0x1F, 0x81], 0),
            Err(Error::BufferOverflow { .. })
        ));
        assert!(matches!(
            open_element(&[0x04, 0x82, 0x01], 0),
            Err(Error::BufferOverflow { .. })
        ));
        assert!(open_element(&[], 0).is_err());
    }

    #[test]
    fn test_invalid_headers() {
        assert!(matches!(
            open_element(&[0x04, 0xFF], 0),
            Err(Error::InvalidHeader { .. })
        ));
        assert!(matches!(
            open_element(&[0x04, 0x80, 0x00, 0x00], 0),
            Err(Error::InvalidHeader { .. })
        ));
        assert!(matches!(
            open_element(&[0x1F, 0x80, 0x01, 0x00], 0),
            Err(Error::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_end_of_contents() {
        let elem = open_element(&[0x00, 0x00], 0).unwrap();
        assert!(elem.header.is_end_of_contents());
        let elem = open_element(&[0x05, 0x00], 0).unwrap();
        assert!(!elem.header.is_end_of_contents());
    }
}
