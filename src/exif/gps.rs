//! Various utilities for dealing with GPS information.

use super::{IFDDataContents, IFDEntry, IFDTag, IFD};
use crate::track::Position;
use std::convert::TryFrom;

// Seconds are written in units of 1/10000 s (about 3 mm of latitude)
pub const SECONDS_DENOMINATOR: u32 = 10_000;
// Altitude is written in centimetres
pub const ALTITUDE_DENOMINATOR: u32 = 100;

/// Convert latitude and longitude coordinates from degrees/minutes/seconds to decimal.
pub fn degrees_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60. + seconds / 3600.
}

/// Convert the magnitude of a decimal coordinate to degrees/minutes/seconds rationals, the way
/// `GPSLatitude` and `GPSLongitude` store it. The sign is dropped; it goes into the reference tag.
pub fn decimal_to_rationals(coordinate: f64) -> [(u32, u32); 3] {
    // Work in integer units of the seconds denominator so rounding can't produce 60 seconds
    let per_degree = 3600 * u64::from(SECONDS_DENOMINATOR);
    let units = (coordinate.abs() * per_degree as f64).round() as u64;

    let degrees = units / per_degree;
    let rem = units % per_degree;
    let minutes = rem / (60 * u64::from(SECONDS_DENOMINATOR));
    let seconds = rem % (60 * u64::from(SECONDS_DENOMINATOR));

    [
        (degrees as u32, 1),
        (minutes as u32, 1),
        (seconds as u32, SECONDS_DENOMINATOR),
    ]
}

/// The hemisphere reference letter for a latitude.
pub fn latitude_ref(latitude: f64) -> &'static str {
    if latitude < 0.0 {
        "S"
    } else {
        "N"
    }
}

/// The hemisphere reference letter for a longitude.
pub fn longitude_ref(longitude: f64) -> &'static str {
    if longitude < 0.0 {
        "W"
    } else {
        "E"
    }
}

/// Whether the GPS IFD records a coordinate, readable or not.
pub fn has_coordinate(gps: &IFD) -> bool {
    gps.find(IFDTag::GPSLatitude).is_some() && gps.find(IFDTag::GPSLongitude).is_some()
}

/// Decode the coordinate (and altitude, if any) recorded in a GPS IFD. Returns `None` when the
/// IFD has no coordinate or the coordinate can't be decoded.
pub fn read_position(gps: &IFD) -> Option<Position> {
    let latitude = read_coordinate(
        gps.find(IFDTag::GPSLatitude)?,
        gps.find(IFDTag::GPSLatitudeRef),
        "S",
    )?;
    let longitude = read_coordinate(
        gps.find(IFDTag::GPSLongitude)?,
        gps.find(IFDTag::GPSLongitudeRef),
        "W",
    )?;

    let mut position = Position::new(latitude, longitude);
    if let Some(altitude) = gps.find(IFDTag::GPSAltitude).and_then(first_f64) {
        let below_sea_level = matches!(
            gps.find(IFDTag::GPSAltitudeRef).and_then(|e| e.content.get(0)),
            Some(IFDDataContents::UnsignedByte(1))
        );
        position = position.with_elevation(if below_sea_level { -altitude } else { altitude });
    }
    Some(position)
}

fn read_coordinate(entry: &IFDEntry, reference: Option<&IFDEntry>, negative: &str) -> Option<f64> {
    let parts = entry
        .content
        .iter()
        .map(f64::try_from)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if parts.len() != 3 {
        return None;
    }

    let value = degrees_to_decimal(parts[0], parts[1], parts[2]);
    if !value.is_finite() {
        return None;
    }

    let negate = reference
        .and_then(IFDEntry::as_str)
        .map_or(false, |r| r.trim().eq_ignore_ascii_case(negative));
    Some(if negate { -value } else { value })
}

fn first_f64(entry: &IFDEntry) -> Option<f64> {
    entry
        .content
        .get(0)
        .and_then(|c| f64::try_from(c).ok())
        .filter(|v| v.is_finite())
}
