//! Aligning photo capture times with track timestamps.
//!
//! A camera records a naive wall-clock reading, a GPS logger records (nominally) UTC. The
//! `TimeAlignment` value carries everything needed to put both on the same time line, so that the
//! effective instant of a photo is a pure function of its capture time and the alignment. Nothing
//! here looks at the time zone or clock of the machine running the tool.

use crate::error::AlignmentError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while_m_n},
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize},
    error::{context, VerboseError},
    multi::many1,
    sequence::{pair, preceded, tuple},
    IResult,
};

type StrResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

// Offsets beyond this are certainly typos.
const MAX_OFFSET_SECS: f64 = 10.0 * 366.0 * 86_400.0;

/// The moment a photo was taken, as recorded by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTime {
    /// Wall-clock reading of the camera.
    pub local: NaiveDateTime,
    /// UTC offset the camera stored alongside the reading, if any.
    pub offset: Option<FixedOffset>,
}

impl CaptureTime {
    pub fn new(local: NaiveDateTime) -> Self {
        CaptureTime {
            local,
            offset: None,
        }
    }

    /// Build a capture time from the Exif `DateTimeOriginal`, `SubSecTimeOriginal` and
    /// `OffsetTimeOriginal` strings. Returns `None` if the date itself is unusable, which is how
    /// cameras without a set clock (`0000:00:00 00:00:00`) end up.
    pub fn from_exif(date_time: &str, sub_sec: Option<&str>, offset: Option<&str>) -> Option<Self> {
        let date_time = date_time.trim_end_matches('\0').trim();
        let mut local = NaiveDateTime::parse_from_str(date_time, "%Y:%m:%d %H:%M:%S").ok()?;

        if let Some(sub_sec) = sub_sec {
            let digits: String = sub_sec
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .take(9)
                .collect();
            if !digits.is_empty() {
                if let Ok(nanos) = format!("{:0<9}", digits).parse::<i64>() {
                    local = local + Duration::nanoseconds(nanos);
                }
            }
        }

        let offset = offset.and_then(|s| parse_zone(s.trim_end_matches('\0')).ok());
        Some(CaptureTime { local, offset })
    }
}

/// Run-wide configuration for turning capture times and track times into instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAlignment {
    /// Added to every photo's capture time, to correct camera clock drift.
    pub clock_offset: Duration,
    /// Zone the camera clock was set to. When unset, the zone the photo records for itself is
    /// used, and failing that UTC.
    pub camera_zone: Option<FixedOffset>,
    /// When set, the wall-clock reading of every track timestamp is reinterpreted in this zone,
    /// whatever offset the log claims. For loggers that write local time with a `Z` suffix.
    pub track_zone: Option<FixedOffset>,
}

impl Default for TimeAlignment {
    fn default() -> Self {
        TimeAlignment::new(Duration::zero())
    }
}

impl TimeAlignment {
    pub fn new(clock_offset: Duration) -> Self {
        TimeAlignment {
            clock_offset,
            camera_zone: None,
            track_zone: None,
        }
    }

    pub fn with_camera_zone(mut self, zone: FixedOffset) -> Self {
        self.camera_zone = Some(zone);
        self
    }

    pub fn with_track_zone(mut self, zone: FixedOffset) -> Self {
        self.track_zone = Some(zone);
        self
    }

    /// The instant on the track's time line at which a photo was taken.
    pub fn photo_instant(&self, capture: &CaptureTime) -> DateTime<Utc> {
        let zone = self.camera_zone.or(capture.offset);
        local_to_utc(capture.local, zone) + self.clock_offset
    }

    /// The instant a track timestamp stands for.
    pub fn track_instant(&self, stated: DateTime<FixedOffset>) -> DateTime<Utc> {
        match self.track_zone {
            None => stated.with_timezone(&Utc),
            Some(zone) => local_to_utc(stated.naive_local(), Some(zone)),
        }
    }
}

fn local_to_utc(local: NaiveDateTime, zone: Option<FixedOffset>) -> DateTime<Utc> {
    let shift = zone.map_or(0, |z| z.local_minus_utc());
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(shift))))
}

/// Parse a signed clock offset. Accepted forms are `[+|-]H:MM[:SS]`, one or more
/// `<number><h|m|s>` parts (`1h30m`, `-45s`), or a bare number of minutes (`-90`, `2.5`).
pub fn parse_clock_offset(s: &str) -> Result<Duration, AlignmentError> {
    let invalid = || AlignmentError::InvalidOffset(s.to_string());

    let (_, (sign, secs)) =
        all_consuming(pair(sign, alt((clock, unit_parts, bare_minutes))))(s.trim())
            .map_err(|_| invalid())?;

    if secs > MAX_OFFSET_SECS {
        return Err(invalid());
    }
    Ok(Duration::milliseconds((sign * secs * 1000.0).round() as i64))
}

/// Parse a fixed UTC offset: `Z`, `UTC`, `±HH`, `±HHMM` or `±HH:MM`.
pub fn parse_zone(s: &str) -> Result<FixedOffset, AlignmentError> {
    let invalid = || AlignmentError::InvalidZone(s.to_string());

    let (_, secs) = all_consuming(zone)(s.trim()).map_err(|_| invalid())?;
    FixedOffset::east_opt(secs).ok_or_else(invalid)
}

fn sign(i: &str) -> StrResult<f64> {
    map(opt(one_of("+-")), |s| if s == Some('-') { -1.0 } else { 1.0 })(i)
}

fn number(i: &str) -> StrResult<f64> {
    context(
        "number",
        map_res(recognize(pair(digit1, opt(pair(char('.'), digit1)))), |s: &str| {
            s.parse::<f64>()
        }),
    )(i)
}

fn two_digits(i: &str) -> StrResult<u32> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_digit()), |s: &str| {
        s.parse::<u32>()
    })(i)
}

// Minutes or seconds field of a clock reading
fn sexagesimal(i: &str) -> StrResult<u32> {
    map_res(two_digits, |v| if v < 60 { Ok(v) } else { Err("out of range") })(i)
}

fn clock(i: &str) -> StrResult<f64> {
    let hours = map_res(digit1, |s: &str| s.parse::<u32>());
    let parser = tuple((hours, char(':'), sexagesimal, opt(preceded(char(':'), sexagesimal))));
    map(context("H:MM[:SS]", parser), |(h, _, m, s)| {
        f64::from(h) * 3600.0 + f64::from(m * 60 + s.unwrap_or(0))
    })(i)
}

fn unit_parts(i: &str) -> StrResult<f64> {
    let part = pair(number, one_of("hmsHMS"));
    map(context("unit parts", many1(part)), |parts| {
        parts
            .iter()
            .map(|(value, unit)| match unit.to_ascii_lowercase() {
                'h' => value * 3600.0,
                'm' => value * 60.0,
                _ => *value,
            })
            .sum::<f64>()
    })(i)
}

fn bare_minutes(i: &str) -> StrResult<f64> {
    map(number, |minutes| minutes * 60.0)(i)
}

fn zone(i: &str) -> StrResult<i32> {
    let utc = map(alt((tag_no_case("utc"), tag_no_case("z"))), |_| 0);
    let hours = map_res(two_digits, |v| if v <= 23 { Ok(v) } else { Err("out of range") });
    let offset = map(
        tuple((one_of("+-"), hours, opt(preceded(opt(char(':')), sexagesimal)))),
        |(sign, h, m)| {
            let secs = (h * 3600 + m.unwrap_or(0) * 60) as i32;
            if sign == '-' {
                -secs
            } else {
                secs
            }
        },
    );
    context("zone", alt((utc, offset)))(i)
}
