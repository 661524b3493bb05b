//! UTCTime and GeneralizedTime codecs.
//!
//! Both are fixed-width ASCII digit strings followed by a zone suffix:
//!
//! ```text
//! UTCTime          YYMMDDHHMMSS          Z | +HHMM | -HHMM
//! GeneralizedTime  YYYYMMDDHHMMSS[.f+]   Z | +HHMM | -HHMM
//! ```
//!
//! Two-digit UTCTime years 50..=99 map to 19xx and 00..=49 to 20xx.

use crate::error::{Error, Result};
use std::fmt;

/// Zone suffix of a time value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Zone {
    /// `Z`
    #[default]
    Utc,
    /// `+HHMM` or `-HHMM`, in minutes east of UTC
    Offset(i16),
}

/// A calendar time as carried by UTCTime or GeneralizedTime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Time {
    /// Four-digit year
    pub year: u16,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    /// 0..=23
    pub hour: u8,
    /// 0..=59
    pub minute: u8,
    /// 0..=60, allowing a leap second
    pub second: u8,
    /// Fractional-second digits, GeneralizedTime only
    pub fraction: Option<String>,
    /// Zone suffix
    pub zone: Zone,
}

impl Time {
    /// Creates a UTC time without fractional seconds, validating each field
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Result<Self> {
        let time = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            fraction: None,
            zone: Zone::Utc,
        };
        time.validate("time")?;
        Ok(time)
    }

    /// Sets the fractional-second digits
    pub fn with_fraction(mut self, digits: impl Into<String>) -> Self {
        self.fraction = Some(digits.into());
        self
    }

    /// Sets the zone suffix
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }

    fn validate(&self, kind: &'static str) -> Result<()> {
        let fields = [
            ("month", self.month, 1, 12),
            ("day", self.day, 1, 31),
            ("hour", self.hour, 0, 23),
            ("minute", self.minute, 0, 59),
            ("second", self.second, 0, 60),
        ];
        for (name, value, min, max) in fields {
            if value < min || value > max {
                return Err(Error::invalid_content(
                    kind,
                    format!("{} {} out of range", name, value),
                ));
            }
        }
        if let Some(fraction) = &self.fraction {
            if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::invalid_content(kind, "fraction must be decimal digits"));
            }
        }
        if let Zone::Offset(minutes) = self.zone {
            if minutes.unsigned_abs() >= 24 * 60 {
                return Err(Error::invalid_content(kind, "zone offset out of range"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )?;
        if let Some(fraction) = &self.fraction {
            write!(f, ".{}", fraction)?;
        }
        match self.zone {
            Zone::Utc => f.write_str("Z"),
            Zone::Offset(minutes) => {
                let sign = if minutes < 0 { '-' } else { '+' };
                let abs = minutes.unsigned_abs();
                write!(f, "{}{:02}:{:02}", sign, abs / 60, abs % 60)
            }
        }
    }
}

fn write_zone(out: &mut String, zone: Zone) {
    match zone {
        Zone::Utc => out.push('Z'),
        Zone::Offset(minutes) => {
            let sign = if minutes < 0 { '-' } else { '+' };
            let abs = minutes.unsigned_abs();
            out.push_str(&format!("{}{:02}{:02}", sign, abs / 60, abs % 60));
        }
    }
}

/// Encodes a UTCTime; the year must fall in 1950..=2049
pub fn encode_utc_time(time: &Time) -> Result<Vec<u8>> {
    time.validate("utc-time")?;
    if !(1950..=2049).contains(&time.year) {
        return Err(Error::invalid_content(
            "utc-time",
            format!("year {} outside 1950..=2049", time.year),
        ));
    }
    if time.fraction.is_some() {
        return Err(Error::invalid_content("utc-time", "fractional seconds not allowed"));
    }
    let mut out = format!(
        "{:02}{:02}{:02}{:02}{:02}{:02}",
        time.year % 100,
        time.month,
        time.day,
        time.hour,
        time.minute,
        time.second
    );
    write_zone(&mut out, time.zone);
    Ok(out.into_bytes())
}

/// Encodes a GeneralizedTime
pub fn encode_generalized_time(time: &Time) -> Result<Vec<u8>> {
    time.validate("generalized-time")?;
    if time.year > 9999 {
        return Err(Error::invalid_content("generalized-time", "year exceeds four digits"));
    }
    let mut out = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        time.year, time.month, time.day, time.hour, time.minute, time.second
    );
    if let Some(fraction) = &time.fraction {
        out.push('.');
        out.push_str(fraction);
    }
    write_zone(&mut out, time.zone);
    Ok(out.into_bytes())
}

fn digits(content: &[u8], at: usize, count: usize, kind: &'static str) -> Result<u16> {
    let field = content
        .get(at..at + count)
        .ok_or_else(|| Error::invalid_content(kind, "content too short"))?;
    field.iter().try_fold(0u16, |acc, &b| {
        if b.is_ascii_digit() {
            Ok(acc * 10 + u16::from(b - b'0'))
        } else {
            Err(Error::invalid_content(
                kind,
                format!("expected digit at octet {}", at),
            ))
        }
    })
}

fn parse_zone(rest: &[u8], at: usize, kind: &'static str) -> Result<Zone> {
    match rest {
        b"Z" => Ok(Zone::Utc),
        [sign @ (b'+' | b'-'), _, _, _, _] => {
            let hours = digits(rest, 1, 2, kind)?;
            let minutes = digits(rest, 3, 2, kind)?;
            if hours > 23 || minutes > 59 {
                return Err(Error::invalid_content(kind, "zone offset out of range"));
            }
            let total = (hours * 60 + minutes) as i16;
            Ok(Zone::Offset(if *sign == b'-' { -total } else { total }))
        }
        _ => Err(Error::invalid_content(
            kind,
            format!("bad zone suffix at octet {}", at),
        )),
    }
}

/// Decodes a UTCTime
pub fn decode_utc_time(content: &[u8]) -> Result<Time> {
    const KIND: &str = "utc-time";
    let yy = digits(content, 0, 2, KIND)?;
    let time = Time {
        year: if yy >= 50 { 1900 + yy } else { 2000 + yy },
        month: digits(content, 2, 2, KIND)? as u8,
        day: digits(content, 4, 2, KIND)? as u8,
        hour: digits(content, 6, 2, KIND)? as u8,
        minute: digits(content, 8, 2, KIND)? as u8,
        second: digits(content, 10, 2, KIND)? as u8,
        fraction: None,
        zone: parse_zone(&content[12..], 12, KIND)?,
    };
    time.validate(KIND)?;
    Ok(time)
}

/// Decodes a GeneralizedTime
pub fn decode_generalized_time(content: &[u8]) -> Result<Time> {
    const KIND: &str = "generalized-time";
    let second = digits(content, 12, 2, KIND)? as u8;

    let mut pos = 14;
    let fraction = match content.get(pos) {
        Some(b'.' | b',') => {
            let start = pos + 1;
            let len = content[start..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            if len == 0 {
                return Err(Error::invalid_content(KIND, "empty fraction"));
            }
            pos = start + len;
            Some(String::from_utf8_lossy(&content[start..pos]).into_owned())
        }
        _ => None,
    };

    let time = Time {
        year: digits(content, 0, 4, KIND)?,
        month: digits(content, 4, 2, KIND)? as u8,
        day: digits(content, 6, 2, KIND)? as u8,
        hour: digits(content, 8, 2, KIND)? as u8,
        minute: digits(content, 10, 2, KIND)? as u8,
        second,
        fraction,
        zone: parse_zone(&content[pos..], pos, KIND)?,
    };
    time.validate(KIND)?;
    Ok(time)
}
