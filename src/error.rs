//! Error types for the library.

use std::{io, path::PathBuf};

/// Fatal errors while building the track: nothing gets tagged if one of these occurs.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("cannot read track log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse track log {path}: {source}")]
    Gpx {
        path: PathBuf,
        #[source]
        source: gpx::errors::GpxError,
    },

    #[error("coordinate ({latitude}, {longitude}) is out of range")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("track contains no usable trackpoints")]
    Empty,
}

/// Per-photo failures of the metadata store.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("not a JPEG file")]
    NotJpeg,

    #[error("corrupt metadata: {0}")]
    Parse(String),

    #[error("photo has no Exif segment to add GPS data to")]
    NoExif,

    #[error("Exif segment would grow to {0} bytes, over the 65535 byte limit")]
    SegmentTooLarge(usize),
}

/// Invalid clock offset or time zone text.
#[derive(Debug, thiserror::Error)]
pub enum AlignmentError {
    #[error("invalid clock offset {0:?} (expected e.g. \"-90\", \"+1:30\" or \"1h30m\")")]
    InvalidOffset(String),

    #[error("invalid time zone {0:?} (expected e.g. \"UTC\", \"+02:00\" or \"-0530\")")]
    InvalidZone(String),
}

/// Errors that abort a batch before any photo is touched.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("cannot list photo folder {path}: {source}")]
    Folder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
