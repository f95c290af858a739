//! Traits and functions for walking the segments of a JPEG file.

mod marker_codes;

pub use marker_codes::JFIFMarkerCode;
use crate::{exif::ExifData, parse};
use nom::error::context;
use std::fmt;

pub trait ParseableSegment {
    /// Returns `true` if we believe that this `ParseableSegment` can parse this segment of the
    /// input. Otherwise, returns `false`.
    fn can_parse_segment(i: parse::Input) -> bool
    where
        Self: Sized;

    /// Returns the segment marker for the parsed segment.
    fn marker(&self) -> JFIFMarkerCode;

    /// Returns the size (in bytes) of the JFIF segment's data section. If the segment doesn't have
    /// a data section, this function should return `None`.
    fn data_size(&self) -> Option<usize>;

    /// Returns the full size of the JFIF segment, including the size bytes and the magic bytes at
    /// the start of the segment.
    fn segment_size(&self) -> usize {
        if self.marker().is_standalone() {
            return 2;
        }
        match self.data_size() {
            None => 4,
            Some(sz) => sz + 4,
        }
    }

    /// Parse the data bytes of the JFIF segment, returning a new instance of the
    /// `ParseableSegment` implementor. `magic` contains the marker bytes for the segment, and
    /// `size` is the size of the data section.
    fn parse_data_bytes(
        i: parse::Input,
        magic: JFIFMarkerCode,
        data_size: usize,
    ) -> parse::Result<Self>
    where
        Self: Sized;

    /// Parse the JFIF segment starting from the segment marker.
    fn parse(i: parse::Input) -> parse::Result<Self>
    where
        Self: Sized,
    {
        use nom::{bytes::complete::take, combinator::verify, number::complete::be_u16};

        let (i, magic) = context("Segment magic", JFIFMarkerCode::parse)(i)?;

        let (i, data, data_size) = if magic.is_standalone() {
            (i, &i[0..0], 0)
        } else {
            // The stored size includes the two size bytes themselves, so it can never be below 2
            // and the data section is two bytes shorter than it.
            let mut parser = context("Data section size", verify(be_u16, |&x| x >= 2));
            let (i, data_size) = parser(i)?;
            let data_size = (data_size - 2) as usize;

            let (i, data) = context("Data section", take(data_size))(i)?;
            (i, data, data_size)
        };

        let (_, result) = context("Data section parser", |x| {
            Self::parse_data_bytes(x, magic, data_size)
        })(data)?;
        Ok((i, result))
    }
}

/// A segment we have no interest in beyond its marker and extent.
#[derive(Debug)]
pub struct RawSegment {
    pub magic: JFIFMarkerCode,
    pub data_size: usize,
}

impl ParseableSegment for RawSegment {
    fn can_parse_segment(i: parse::Input) -> bool {
        JFIFMarkerCode::parse(i).is_ok()
    }

    fn marker(&self) -> JFIFMarkerCode {
        self.magic
    }

    fn data_size(&self) -> Option<usize> {
        Some(self.data_size)
    }

    fn parse_data_bytes(
        i: parse::Input,
        magic: JFIFMarkerCode,
        data_size: usize,
    ) -> parse::Result<Self> {
        use nom::bytes::complete::take;

        // The bytes stay in the file buffer; callers that need them slice it with the span.
        let (i, _) = context("RawSegment data bytes", take(data_size))(i)?;
        Ok((i, RawSegment { magic, data_size }))
    }
}

/// An enum that wraps around the segment types we distinguish in a JPEG image.
pub enum JFIFSegment {
    ExifSegment(ExifData),
    Raw(RawSegment),
}

impl fmt::Debug for JFIFSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JFIFSegment::ExifSegment(_) => write!(f, "ExifSegment"),
            JFIFSegment::Raw(seg) => write!(f, "{:?} segment", seg.magic),
        }
    }
}

impl JFIFSegment {
    pub fn parse(i: parse::Input) -> parse::Result<Self> {
        if ExifData::can_parse_segment(i) {
            let (i, data) = context("JFIFSegment::ExifSegment", ExifData::parse)(i)?;
            Ok((i, JFIFSegment::ExifSegment(data)))
        } else {
            let (i, data) = context("JFIFSegment::Raw", RawSegment::parse)(i)?;
            Ok((i, JFIFSegment::Raw(data)))
        }
    }

    pub fn data(&self) -> &dyn ParseableSegment {
        match self {
            JFIFSegment::ExifSegment(data) => data,
            JFIFSegment::Raw(data) => data,
        }
    }
}

/// A parsed segment together with the offset of its marker within the file.
#[derive(Debug)]
pub struct SegmentSpan {
    pub start: usize,
    pub segment: JFIFSegment,
}

impl SegmentSpan {
    /// Offset one past the last byte of the segment.
    pub fn end(&self) -> usize {
        self.start + self.segment.data().segment_size()
    }
}
