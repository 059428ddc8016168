//! `java.time` values carried by the `java.time.Ser` proxy.
//!
//! Each value is one type byte followed by the type's external form; the
//! `Display` impls reproduce the corresponding Java `toString` output.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};

use crate::context::error::RenderError;
use crate::context::stream::Reader;

pub const SER_CLASS: &str = "java.time.Ser";

const DURATION: u8 = 1;
const INSTANT: u8 = 2;
const LOCAL_DATE: u8 = 3;
const LOCAL_TIME: u8 = 4;
const LOCAL_DATE_TIME: u8 = 5;
const ZONED_DATE_TIME: u8 = 6;
const ZONE_REGION: u8 = 7;
const ZONE_OFFSET: u8 = 8;
const OFFSET_TIME: u8 = 9;
const OFFSET_DATE_TIME: u8 = 10;
const YEAR: u8 = 11;
const YEAR_MONTH: u8 = 12;
const MONTH_DAY: u8 = 13;
const PERIOD: u8 = 14;

const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// Offset from UTC in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub i32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zone {
    Region(String),
    Offset(Offset),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JavaTime {
    Duration(TimeDelta),
    Instant(DateTime<Utc>),
    LocalDate(NaiveDate),
    LocalTime(NaiveTime),
    LocalDateTime(NaiveDateTime),
    ZonedDateTime(NaiveDateTime, Offset, Zone),
    ZoneRegion(String),
    ZoneOffset(Offset),
    OffsetTime(NaiveTime, Offset),
    OffsetDateTime(NaiveDateTime, Offset),
    Year(i32),
    YearMonth(i32, u32),
    MonthDay(u32, u32),
    Period { years: i32, months: i32, days: i32 },
}

impl JavaTime {
    fn kind(&self) -> u8 {
        match self {
            JavaTime::Duration(_) => DURATION,
            JavaTime::Instant(_) => INSTANT,
            JavaTime::LocalDate(_) => LOCAL_DATE,
            JavaTime::LocalTime(_) => LOCAL_TIME,
            JavaTime::LocalDateTime(_) => LOCAL_DATE_TIME,
            JavaTime::ZonedDateTime(..) => ZONED_DATE_TIME,
            JavaTime::ZoneRegion(_) => ZONE_REGION,
            JavaTime::ZoneOffset(_) => ZONE_OFFSET,
            JavaTime::OffsetTime(..) => OFFSET_TIME,
            JavaTime::OffsetDateTime(..) => OFFSET_DATE_TIME,
            JavaTime::Year(_) => YEAR,
            JavaTime::YearMonth(..) => YEAR_MONTH,
            JavaTime::MonthDay(..) => MONTH_DAY,
            JavaTime::Period { .. } => PERIOD,
        }
    }

    pub fn type_name(&self) -> &'static str {
        kind_name(self.kind()).unwrap_or(SER_CLASS)
    }

    /// `LocalDate` and `LocalDateTime` print as plain text; the rest go
    /// through JSON as strings.
    pub fn is_scalar(&self) -> bool {
        matches!(self, JavaTime::LocalDate(_) | JavaTime::LocalDateTime(_))
    }
}

fn kind_name(kind: u8) -> Option<&'static str> {
    Some(match kind {
        DURATION => "java.time.Duration",
        INSTANT => "java.time.Instant",
        LOCAL_DATE => "java.time.LocalDate",
        LOCAL_TIME => "java.time.LocalTime",
        LOCAL_DATE_TIME => "java.time.LocalDateTime",
        ZONED_DATE_TIME => "java.time.ZonedDateTime",
        ZONE_REGION => "java.time.ZoneRegion",
        ZONE_OFFSET => "java.time.ZoneOffset",
        OFFSET_TIME => "java.time.OffsetTime",
        OFFSET_DATE_TIME => "java.time.OffsetDateTime",
        YEAR => "java.time.Year",
        YEAR_MONTH => "java.time.YearMonth",
        MONTH_DAY => "java.time.MonthDay",
        PERIOD => "java.time.Period",
        _ => return None,
    })
}

/// Type a `java.time.Ser` payload stands for, read from its type byte
/// alone so that invalid values keep their name.
pub fn type_name(bytes: &[u8]) -> Option<&'static str> {
    bytes.first().copied().and_then(kind_name)
}

/// Decodes the block data of one `java.time.Ser` instance.
pub fn decode(bytes: &[u8]) -> Result<JavaTime, RenderError> {
    let mut r = Reader::new(bytes);
    let kind = r.u8().map_err(truncated)?;
    read_kind(&mut r, kind).map_err(|err| match err {
        ReadError::Eof => RenderError::Truncated(SER_CLASS.to_string()),
        ReadError::Render(err) => err,
    })
}

enum ReadError {
    Eof,
    Render(RenderError),
}

impl From<crate::context::error::DecodeError> for ReadError {
    fn from(_: crate::context::error::DecodeError) -> Self {
        ReadError::Eof
    }
}

impl From<RenderError> for ReadError {
    fn from(err: RenderError) -> Self {
        ReadError::Render(err)
    }
}

fn truncated(_: crate::context::error::DecodeError) -> RenderError {
    RenderError::Truncated(SER_CLASS.to_string())
}

fn invalid(what: &'static str) -> ReadError {
    RenderError::InvalidTime(what).into()
}

fn read_kind(r: &mut Reader<'_>, kind: u8) -> Result<JavaTime, ReadError> {
    Ok(match kind {
        DURATION => {
            let seconds = r.i64()?;
            let nanos = read_nanos(r, "java.time.Duration")?;
            let delta = TimeDelta::try_seconds(seconds)
                .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(nanos.into())))
                .ok_or_else(|| invalid("java.time.Duration"))?;
            JavaTime::Duration(delta)
        }
        INSTANT => {
            let seconds = r.i64()?;
            let nanos = read_nanos(r, "java.time.Instant")?;
            let instant = DateTime::from_timestamp(seconds, nanos as u32)
                .ok_or_else(|| invalid("java.time.Instant"))?;
            JavaTime::Instant(instant)
        }
        LOCAL_DATE => JavaTime::LocalDate(read_date(r)?),
        LOCAL_TIME => JavaTime::LocalTime(read_time(r)?),
        LOCAL_DATE_TIME => JavaTime::LocalDateTime(read_date_time(r)?),
        ZONED_DATE_TIME => {
            let date_time = read_date_time(r)?;
            let offset = read_offset(r)?;
            let zone = match r.u8()? {
                ZONE_REGION => Zone::Region(r.utf()?),
                ZONE_OFFSET => Zone::Offset(read_offset(r)?),
                other => return Err(RenderError::UnsupportedTime(other).into()),
            };
            JavaTime::ZonedDateTime(date_time, offset, zone)
        }
        ZONE_REGION => JavaTime::ZoneRegion(r.utf()?),
        ZONE_OFFSET => JavaTime::ZoneOffset(read_offset(r)?),
        OFFSET_TIME => JavaTime::OffsetTime(read_time(r)?, read_offset(r)?),
        OFFSET_DATE_TIME => JavaTime::OffsetDateTime(read_date_time(r)?, read_offset(r)?),
        YEAR => JavaTime::Year(r.i32()?),
        YEAR_MONTH => {
            let year = r.i32()?;
            let month = r.i8()?;
            if !(1..=12).contains(&month) {
                return Err(invalid("java.time.YearMonth"));
            }
            JavaTime::YearMonth(year, month as u32)
        }
        MONTH_DAY => {
            let (month, day) = (r.i8()?, r.i8()?);
            // a leap year, so --02-29 is accepted
            let date = calendar_date(2000, month, day).ok_or_else(|| invalid("java.time.MonthDay"))?;
            JavaTime::MonthDay(date.month(), date.day())
        }
        PERIOD => JavaTime::Period {
            years: r.i32()?,
            months: r.i32()?,
            days: r.i32()?,
        },
        other => return Err(RenderError::UnsupportedTime(other).into()),
    })
}

fn read_nanos(r: &mut Reader<'_>, what: &'static str) -> Result<i32, ReadError> {
    let nanos = r.i32()?;
    if !(0..NANOS_PER_SECOND).contains(&nanos) {
        return Err(invalid(what));
    }
    Ok(nanos)
}

fn calendar_date(year: i32, month: i8, day: i8) -> Option<NaiveDate> {
    let month = u32::try_from(month).ok()?;
    let day = u32::try_from(day).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn read_date(r: &mut Reader<'_>) -> Result<NaiveDate, ReadError> {
    let year = r.i32()?;
    let (month, day) = (r.i8()?, r.i8()?);
    calendar_date(year, month, day).ok_or_else(|| invalid("java.time.LocalDate"))
}

/// Hour, minute and second are each followed by the next component unless
/// stored bit-inverted, which marks the last one present.
fn read_time(r: &mut Reader<'_>) -> Result<NaiveTime, ReadError> {
    let (mut minute, mut second, mut nano) = (0, 0, 0);

    let mut hour = r.i8()?;
    if hour < 0 {
        hour = !hour;
    } else {
        minute = r.i8()?;
        if minute < 0 {
            minute = !minute;
        } else {
            second = r.i8()?;
            if second < 0 {
                second = !second;
            } else {
                nano = read_nanos(r, "java.time.LocalTime")?;
            }
        }
    }

    NaiveTime::from_hms_nano_opt(hour as u32, minute as u32, second as u32, nano as u32)
        .ok_or_else(|| invalid("java.time.LocalTime"))
}

fn read_date_time(r: &mut Reader<'_>) -> Result<NaiveDateTime, ReadError> {
    let date = read_date(r)?;
    let time = read_time(r)?;
    Ok(date.and_time(time))
}

/// One signed byte of 15-minute units, or 127 followed by total seconds.
fn read_offset(r: &mut Reader<'_>) -> Result<Offset, ReadError> {
    let quarters = r.i8()?;
    let seconds = if quarters == 127 {
        r.i32()?
    } else {
        quarters as i32 * 900
    };
    if !(-18 * 3600..=18 * 3600).contains(&seconds) {
        return Err(invalid("java.time.ZoneOffset"));
    }
    Ok(Offset(seconds))
}

// ----------------------------
// toString
// ----------------------------

/// Fraction digits in groups of three, as many as needed.
fn write_nanos(f: &mut fmt::Formatter<'_>, nano: u32) -> fmt::Result {
    if nano == 0 {
        Ok(())
    } else if nano % 1_000_000 == 0 {
        write!(f, ".{:03}", nano / 1_000_000)
    } else if nano % 1_000 == 0 {
        write!(f, ".{:06}", nano / 1_000)
    } else {
        write!(f, ".{nano:09}")
    }
}

/// `HH:mm`, then seconds and fraction only when non-zero.
fn write_time(f: &mut fmt::Formatter<'_>, time: &NaiveTime) -> fmt::Result {
    write!(f, "{:02}:{:02}", time.hour(), time.minute())?;
    if time.second() > 0 || time.nanosecond() > 0 {
        write!(f, ":{:02}", time.second())?;
        write_nanos(f, time.nanosecond())?;
    }
    Ok(())
}

/// chrono prints dates the way `LocalDate` does: four-digit padding, `+`
/// past 9999.
fn write_date_time(f: &mut fmt::Formatter<'_>, date_time: &NaiveDateTime) -> fmt::Result {
    write!(f, "{}T", date_time.date())?;
    write_time(f, &date_time.time())
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("Z");
        }
        let sign = if self.0 < 0 { '-' } else { '+' };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{:02}:{:02}", abs / 3600, abs / 60 % 60)?;
        if abs % 60 != 0 {
            write!(f, ":{:02}", abs % 60)?;
        }
        Ok(())
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Region(id) => f.write_str(id),
            Zone::Offset(offset) => offset.fmt(f),
        }
    }
}

/// `PT` followed by hours, minutes and seconds, each signed and omitted
/// when zero.
fn fmt_duration(f: &mut fmt::Formatter<'_>, delta: &TimeDelta) -> fmt::Result {
    if *delta == TimeDelta::zero() {
        return f.write_str("PT0S");
    }
    // truncated toward zero, the fraction carries the same sign
    let total = delta.num_seconds();
    let fraction = delta.subsec_nanos().unsigned_abs();
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);

    f.write_str("PT")?;
    if hours != 0 {
        write!(f, "{hours}H")?;
    }
    if minutes != 0 {
        write!(f, "{minutes}M")?;
    }
    if seconds == 0 && fraction == 0 {
        return Ok(());
    }
    if seconds == 0 && *delta < TimeDelta::zero() {
        f.write_str("-0")?;
    } else {
        write!(f, "{seconds}")?;
    }
    if fraction > 0 {
        let digits = format!("{fraction:09}");
        write!(f, ".{}", digits.trim_end_matches('0'))?;
    }
    f.write_str("S")
}

/// ISO instant: seconds always present.
fn fmt_instant(f: &mut fmt::Formatter<'_>, instant: &DateTime<Utc>) -> fmt::Result {
    write!(f, "{}", instant.format("%Y-%m-%dT%H:%M:%S"))?;
    write_nanos(f, instant.nanosecond())?;
    f.write_str("Z")
}

impl fmt::Display for JavaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaTime::Duration(delta) => fmt_duration(f, delta),
            JavaTime::Instant(instant) => fmt_instant(f, instant),
            JavaTime::LocalDate(date) => date.fmt(f),
            JavaTime::LocalTime(time) => write_time(f, time),
            JavaTime::LocalDateTime(date_time) => write_date_time(f, date_time),
            JavaTime::ZonedDateTime(date_time, offset, zone) => {
                write_date_time(f, date_time)?;
                write!(f, "{offset}")?;
                match zone {
                    Zone::Offset(z) if z == offset => Ok(()),
                    _ => write!(f, "[{zone}]"),
                }
            }
            JavaTime::ZoneRegion(id) => f.write_str(id),
            JavaTime::ZoneOffset(offset) => offset.fmt(f),
            JavaTime::OffsetTime(time, offset) => {
                write_time(f, time)?;
                write!(f, "{offset}")
            }
            JavaTime::OffsetDateTime(date_time, offset) => {
                write_date_time(f, date_time)?;
                write!(f, "{offset}")
            }
            JavaTime::Year(year) => write!(f, "{year}"),
            JavaTime::YearMonth(year, month) => {
                let abs = year.unsigned_abs();
                if abs < 1000 {
                    let sign = if *year < 0 { "-" } else { "" };
                    write!(f, "{sign}{abs:04}")?;
                } else {
                    write!(f, "{year}")?;
                }
                write!(f, "-{month:02}")
            }
            JavaTime::MonthDay(month, day) => write!(f, "--{month:02}-{day:02}"),
            JavaTime::Period {
                years,
                months,
                days,
            } => {
                if *years == 0 && *months == 0 && *days == 0 {
                    return f.write_str("P0D");
                }
                f.write_str("P")?;
                if *years != 0 {
                    write!(f, "{years}Y")?;
                }
                if *months != 0 {
                    write!(f, "{months}M")?;
                }
                if *days != 0 {
                    write!(f, "{days}D")?;
                }
                Ok(())
            }
        }
    }
}
