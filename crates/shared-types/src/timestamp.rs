//! Record timestamps and dated record names.
//!
//! Timestamps are second-resolution, fixed-width (`YYYYMMDD_HHMMSS`) and
//! lexicographically sortable, so the string form, the calendar form and
//! the on-disk sort order always agree.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::errors::TypeError;
use crate::ids::RecordKind;

const COMPACT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// A second-resolution record timestamp (`YYYYMMDD_HHMMSS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(PrimitiveDateTime);

impl Timestamp {
    /// Parse the compact form.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let bytes = value.as_bytes();
        let shape_ok = bytes.len() == 15
            && bytes[8] == b'_'
            && bytes[..8].iter().all(u8::is_ascii_digit)
            && bytes[9..].iter().all(u8::is_ascii_digit);
        if !shape_ok {
            return Err(TypeError::InvalidTimestamp {
                value: value.to_owned(),
                reason: "expected YYYYMMDD_HHMMSS",
            });
        }
        let dt = PrimitiveDateTime::parse(value, COMPACT).map_err(|_| {
            TypeError::InvalidTimestamp {
                value: value.to_owned(),
                reason: "not a valid calendar date/time",
            }
        })?;
        Ok(Self(dt))
    }

    /// Truncate a wall-clock reading to second resolution.
    pub fn from_datetime(dt: OffsetDateTime) -> Self {
        let dt = dt.replace_nanosecond(0).unwrap_or(dt);
        Self(PrimitiveDateTime::new(dt.date(), dt.time()))
    }

    /// The timestamp one second later. Used to disambiguate same-second
    /// writes of one record kind.
    pub fn next_second(&self) -> Self {
        Self(self.0.saturating_add(Duration::SECOND))
    }

    /// The compact form used in file names.
    pub fn compact(&self) -> String {
        let d = self.0.date();
        let t = self.0.time();
        format!(
            "{:04}{:02}{:02}_{:02}{:02}{:02}",
            d.year(),
            u8::from(d.month()),
            d.day(),
            t.hour(),
            t.minute(),
            t.second()
        )
    }

    /// Human-friendly rendering (`YYYY-MM-DD HH:MM`) for admin views.
    pub fn pretty(&self) -> String {
        let d = self.0.date();
        let t = self.0.time();
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}",
            d.year(),
            u8::from(d.month()),
            d.day(),
            t.hour(),
            t.minute()
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compact())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.compact())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}

/// Identity of one immutable dated record: `(kind, timestamp)`.
///
/// The file form is `<kind>_<YYYYMMDD>_<HHMMSS>.json`; the serde form is
/// the two-element array used by state records to reference a form
/// submission.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatedName {
    pub kind: RecordKind,
    pub timestamp: Timestamp,
}

impl DatedName {
    pub fn new(kind: RecordKind, timestamp: Timestamp) -> Self {
        Self { kind, timestamp }
    }

    /// File stem, without the `.json` suffix.
    pub fn stem(&self) -> String {
        format!("{}_{}", self.kind, self.timestamp)
    }

    /// Full file name.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.stem())
    }

    /// Parse a file name or stem back into `(kind, timestamp)`.
    ///
    /// Kinds may themselves contain underscores, so the timestamp is
    /// taken from the fixed-width tail.
    pub fn parse(name: &str) -> Result<Self, TypeError> {
        let stem = name.strip_suffix(".json").unwrap_or(name);
        // "<kind>_" + 15-char timestamp
        if stem.len() < 17 {
            return Err(TypeError::InvalidDatedName {
                value: name.to_owned(),
                reason: "too short for a dated record name",
            });
        }
        let (head, ts_part) = stem.split_at(stem.len() - 15);
        let kind_part = head.strip_suffix('_').ok_or(TypeError::InvalidDatedName {
            value: name.to_owned(),
            reason: "missing '_' before the timestamp",
        })?;
        Ok(Self {
            kind: RecordKind::new(kind_part)?,
            timestamp: Timestamp::parse(ts_part)?,
        })
    }
}

impl fmt::Display for DatedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

impl Serialize for DatedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.kind, &self.timestamp).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DatedName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (kind, timestamp) = <(RecordKind, Timestamp)>::deserialize(deserializer)?;
        Ok(Self { kind, timestamp })
    }
}
