//! Loading a track from a GPX file.

use super::{screen, TrackIndex, Trackpoint};
use crate::{error::TrackError, time::TimeAlignment};
use chrono::DateTime;
use std::{fmt, fs, mem, path::Path};
use tracing::{info, warn};

/// A `<trkpt>` that could not be turned into a trackpoint. The indices locate it in the file:
/// track, segment within the track, point within the segment (all zero-based).
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedPoint {
    pub track: usize,
    pub segment: usize,
    pub point: usize,
    pub reason: String,
}

impl fmt::Display for RejectedPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "track {} segment {} point {}: {}",
            self.track, self.segment, self.point, self.reason
        )
    }
}

/// The index built from a GPX file, plus the points that had to be left out of it.
#[derive(Debug)]
pub struct LoadedTrack {
    pub index: TrackIndex,
    pub rejected: Vec<RejectedPoint>,
}

/// Read every `<trkpt>` of every track and segment in the GPX file at `path` into one index.
///
/// Points without a usable time or with out-of-range coordinates are reported and skipped. Failing
/// to read or parse the file, or ending up with no usable point at all, is an error.
pub fn load(path: &Path, alignment: &TimeAlignment) -> Result<LoadedTrack, TrackError> {
    let text = fs::read_to_string(path).map_err(|source| TrackError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut screened = screen::screen(&text);
    let gpx = gpx::read(screened.document.as_bytes()).map_err(|source| TrackError::Gpx {
        path: path.to_path_buf(),
        source,
    })?;

    let mut points = Vec::new();
    let mut rejected = mem::take(&mut screened.rejected);

    for (t, track) in gpx.tracks.iter().enumerate() {
        for (s, segment) in track.segments.iter().enumerate() {
            for (p, waypoint) in segment.points.iter().enumerate() {
                match trackpoint(waypoint, alignment) {
                    Ok(point) => points.push(point),
                    Err(reason) => rejected.push(RejectedPoint {
                        track: t,
                        segment: s,
                        point: screened.original_index(t, s, p),
                        reason,
                    }),
                }
            }
        }
    }

    rejected.sort_by_key(|r| (r.track, r.segment, r.point));
    for r in &rejected {
        warn!("{}: skipping {}", path.display(), r);
    }

    let index = TrackIndex::new(points)?;
    let (first, last) = index.window();
    info!(
        "Loaded {} trackpoints from {} covering {} - {}",
        index.len(),
        path.display(),
        first.to_rfc3339(),
        last.to_rfc3339()
    );

    Ok(LoadedTrack { index, rejected })
}

fn trackpoint(waypoint: &gpx::Waypoint, alignment: &TimeAlignment) -> Result<Trackpoint, String> {
    let time = waypoint.time.as_ref().ok_or("no <time> element")?;
    let iso = time.format().map_err(|e| format!("bad time: {}", e))?;
    let stated =
        DateTime::parse_from_rfc3339(&iso).map_err(|e| format!("bad time {}: {}", iso, e))?;

    let point = waypoint.point();
    Trackpoint::new(
        alignment.track_instant(stated),
        point.y(),
        point.x(),
        waypoint.elevation,
    )
    .map_err(|e| e.to_string())
}
