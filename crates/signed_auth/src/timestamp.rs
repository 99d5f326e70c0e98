//! Millisecond-precision instants and their fixed `YYYYMMDD.HHMMSSmmm` text form.
//!
//! The text form is part of the signed payload, so formatting must be
//! deterministic and parsing must accept exactly what formatting produces.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::TimestampParseError;

const TEXT_LEN: usize = 18;
const SEPARATOR_AT: usize = 8;
// 0000-01-01T00:00:00.000Z
const MIN_MILLIS: i64 = -62_167_219_200_000;
// 9999-12-31T23:59:59.999Z
const MAX_MILLIS: i64 = 253_402_300_799_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Build an instant from milliseconds since the Unix epoch.
    ///
    /// Returns `None` when the instant falls outside years 0000..=9999,
    /// which the 4-digit year field cannot represent.
    pub fn from_millis(millis: i64) -> Option<Self> {
        if !(MIN_MILLIS..=MAX_MILLIS).contains(&millis) {
            return None;
        }
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// `00000101.000000000`
    pub fn earliest() -> Self {
        Self(DateTime::from_timestamp_millis(MIN_MILLIS).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    /// `99991231.235959999`
    pub fn latest() -> Self {
        Self(DateTime::from_timestamp_millis(MAX_MILLIS).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    pub fn now() -> Self {
        Self::truncate(Utc::now())
    }

    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Shift by a signed number of milliseconds, clamped to
    /// [`Timestamp::earliest`] and [`Timestamp::latest`].
    pub fn offset_millis(&self, delta: i64) -> Self {
        let target = self
            .as_millis()
            .saturating_add(delta)
            .clamp(MIN_MILLIS, MAX_MILLIS);
        Self::from_millis(target).unwrap_or(*self)
    }

    /// Shift by a signed number of milliseconds, or `None` when the result
    /// has no text form.
    pub fn checked_offset_millis(&self, delta: i64) -> Option<Self> {
        Self::from_millis(self.as_millis().checked_add(delta)?)
    }

    pub fn parse(text: &str) -> Result<Self, TimestampParseError> {
        let err = || TimestampParseError {
            text: text.to_owned(),
        };

        let bytes = text.as_bytes();
        let well_shaped = bytes.len() == TEXT_LEN
            && bytes.iter().enumerate().all(|(i, b)| {
                if i == SEPARATOR_AT {
                    *b == b'.'
                } else {
                    b.is_ascii_digit()
                }
            });
        if !well_shaped {
            return Err(err());
        }

        // Shape is validated above, so every slice below is ASCII digits.
        let field = |from: usize, to: usize| -> u32 {
            text[from..to]
                .bytes()
                .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
        };

        let date = NaiveDate::from_ymd_opt(field(0, 4) as i32, field(4, 6), field(6, 8))
            .ok_or_else(err)?;
        let datetime = date
            .and_hms_milli_opt(field(9, 11), field(11, 13), field(13, 15), field(15, 18))
            .ok_or_else(err)?;

        Ok(Self(Utc.from_utc_datetime(&datetime)))
    }

    fn truncate(instant: DateTime<Utc>) -> Self {
        let millis = instant.timestamp_subsec_millis();
        Self(
            instant
                .with_nanosecond(millis * 1_000_000)
                .unwrap_or(instant),
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.0;
        write!(
            f,
            "{:04}{:02}{:02}.{:02}{:02}{:02}{:03}",
            t.year(),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second(),
            t.timestamp_subsec_millis()
        )
    }
}

impl std::str::FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
