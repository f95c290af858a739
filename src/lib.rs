#![forbid(unsafe_code)]

//! Geotag JPEG photos from a GPS track log.
//!
//! The track log is loaded into a [`TrackIndex`] (see [`track::gpx::load`]), and a
//! [`PhotoTagger`] walks a folder of photos, working out where each one was taken by
//! interpolating the track at the photo's capture time. Photo metadata is read and written
//! through the [`MetadataStore`] trait; [`JpegExifStore`] implements it for JPEG files by
//! parsing and extending their Exif data directly.

pub mod error;
pub mod exif;
pub mod jfif;
pub mod metadata;
mod parse;
pub mod tagger;
pub mod time;
pub mod track;
pub mod version;

pub use error::{AlignmentError, MetadataError, TagError, TrackError};
pub use metadata::{JpegExifStore, MetadataStore, PhotoRecord};
pub use tagger::{BatchReport, Outcome, PhotoOutcome, PhotoTagger, SkipReason, TaggerOptions};
pub use time::{CaptureTime, TimeAlignment};
pub use track::{Position, TrackIndex, Trackpoint};

use jfif::{JFIFMarkerCode, JFIFSegment, SegmentSpan};
use nom::{bytes::complete::tag, error::context};

/// The segments at the head of a JPEG file, up to and including the first SOS segment. The
/// entropy-coded data after it is left alone.
#[derive(Debug)]
pub struct JPEGFile {
    pub file_size: usize,
    pub segments: Vec<SegmentSpan>,
}

impl JPEGFile {
    pub fn parse(i: parse::Input) -> parse::Result<Self> {
        let file_size = i.len();

        // Bytes to mark the start of the image
        let (_, _) = context("Start of image", tag(JFIFMarkerCode::SOI.as_bytes()))(i)?;

        let mut segments = Vec::new();
        let mut current_input = i;
        loop {
            let start = file_size - current_input.len();
            let (next_i, segment) = context("JFIF segment", JFIFSegment::parse)(current_input)?;
            current_input = next_i;

            let marker = segment.data().marker();
            segments.push(SegmentSpan { start, segment });
            if marker == JFIFMarkerCode::SOS || marker == JFIFMarkerCode::EOI {
                break;
            }
        }

        let file = JPEGFile {
            file_size,
            segments,
        };
        Ok((current_input, file))
    }

    /// The first Exif segment, with its location in the file.
    pub fn exif(&self) -> Option<(&SegmentSpan, &exif::ExifData)> {
        self.segments.iter().find_map(|span| match &span.segment {
            JFIFSegment::ExifSegment(data) => Some((span, data)),
            _ => None,
        })
    }
}
