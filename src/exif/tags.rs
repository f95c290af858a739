//! Provides the IFDTag enum, which names the IFD tags this crate reads or writes (`Make` and
//! `GPSMapDatum` only appear in test fixtures). Entries with any other tag are still parsed and
//! carried along verbatim.

use derive_try_from_primitive::TryFromPrimitive;
use std::convert::TryFrom;

#[derive(Debug, Clone, Copy, TryFromPrimitive, PartialEq, Eq)]
#[repr(u16)]
pub enum IFDTag {
    // Catch-all tag for unknown entry types
    Unknown = 0xffff,

    // GPS tags
    // Taken from https://www.exiftool.org/TagNames/GPS.html
    GPSVersionID = 0x0000,
    GPSLatitudeRef = 0x0001,
    GPSLatitude = 0x0002,
    GPSLongitudeRef = 0x0003,
    GPSLongitude = 0x0004,
    GPSAltitudeRef = 0x0005,
    GPSAltitude = 0x0006,
    GPSMapDatum = 0x0012,

    // Taken from https://www.exiftool.org/TagNames/EXIF.html
    Make = 0x010f,

    ExifOffset = 0x8769,
    GPSInfo = 0x8825,

    DateTimeOriginal = 0x9003,
    OffsetTimeOriginal = 0x9011,
    SubSecTimeOriginal = 0x9291,
}

impl IFDTag {
    /// Map a raw tag number onto an `IFDTag`, falling back to `IFDTag::Unknown`.
    pub fn from_code(code: u16) -> Self {
        Self::try_from(code).unwrap_or(IFDTag::Unknown)
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}
