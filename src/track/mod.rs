//! The track index: time-ordered GPS samples with point-in-time lookup.

pub mod gpx;
mod screen;

use crate::error::TrackError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A geographic position, as interpolated from a track or read from a photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Position {
            latitude,
            longitude,
            elevation: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }
}

/// One timestamped GPS sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trackpoint {
    time: DateTime<Utc>,
    position: Position,
}

impl Trackpoint {
    /// Create a trackpoint, rejecting coordinates that aren't finite or lie outside
    /// [-90, 90] x [-180, 180]. A non-finite elevation is dropped rather than rejected.
    pub fn new(
        time: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        elevation: Option<f64>,
    ) -> Result<Self, TrackError> {
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !in_range {
            return Err(TrackError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }

        let position = Position {
            latitude,
            longitude,
            elevation: elevation.filter(|e| e.is_finite()),
        };
        Ok(Trackpoint { time, position })
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// Immutable, time-ordered set of trackpoints.
#[derive(Debug, Clone)]
pub struct TrackIndex {
    points: Vec<Trackpoint>,
}

impl TrackIndex {
    /// Build the index. Points are sorted by time; the sort is stable, so points sharing a
    /// timestamp keep their input order.
    pub fn new(mut points: Vec<Trackpoint>) -> Result<Self, TrackError> {
        if points.is_empty() {
            return Err(TrackError::Empty);
        }
        points.sort_by_key(|p| p.time);
        Ok(TrackIndex { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Trackpoint] {
        &self.points
    }

    /// First and last timestamps of the track.
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        // `new` refuses empty input, so both ends exist
        let first = self.points[0].time;
        let last = self.points[self.points.len() - 1].time;
        (first, last)
    }

    /// Position at instant `t`, or `None` if `t` lies outside the track's window.
    ///
    /// Between two samples, latitude and longitude are linearly interpolated by the fraction of
    /// the gap that has elapsed (and elevation too, when both samples carry one). A `t` equal to a
    /// sample's timestamp returns that sample's position unchanged; if several samples share it,
    /// the earliest in input order wins.
    pub fn locate(&self, t: DateTime<Utc>) -> Option<Position> {
        let (first, last) = self.window();
        if t < first || t > last {
            return None;
        }

        // Index of the first point at or after t; it exists because t <= last.
        let after_idx = self.points.partition_point(|p| p.time < t);
        let after = &self.points[after_idx];
        if after.time == t || after_idx == 0 {
            return Some(after.position);
        }
        let before = &self.points[after_idx - 1];

        let span = seconds_between(before.time, after.time);
        let frac = if span > 0.0 {
            seconds_between(before.time, t) / span
        } else {
            0.0
        };

        Some(interpolate(&before.position, &after.position, frac))
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let d = to - from;
    match d.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => d.num_seconds() as f64,
    }
}

fn interpolate(a: &Position, b: &Position, frac: f64) -> Position {
    let lerp = |x: f64, y: f64| x + frac * (y - x);
    let elevation = match (a.elevation, b.elevation) {
        (Some(x), Some(y)) => Some(lerp(x, y)),
        _ => None,
    };
    Position {
        latitude: lerp(a.latitude, b.latitude),
        longitude: lerp(a.longitude, b.longitude),
        elevation,
    }
}
