//! Adding GPS data to an existing TIFF structure.
//!
//! Nothing already in the TIFF block is moved or rewritten. The new GPS IFD and a copy of IFD0
//! that points at it are appended after the existing data, and the header is repointed at the
//! copy. Since every existing byte keeps its offset, entries elsewhere (the Exif IFD, maker notes,
//! the thumbnail IFD) stay valid without being touched, and copied entries can be carried over
//! verbatim.

use super::{gps, ExifData, IFDDataFormat, IFDEntry, IFDTag, TIFFByteAlignment};
use crate::{error::MetadataError, track::Position};
use std::convert::TryFrom;

/// An entry of an IFD being written out.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub tag: u16,
    pub format: u16,
    pub count: u32,
    pub value: EntryValue,
}

#[derive(Debug, Clone)]
pub enum EntryValue {
    /// Stored in the entry's own value field.
    Field([u8; 4]),
    /// Stored after the IFD, with its offset in the value field.
    Data(Vec<u8>),
}

impl NewEntry {
    /// Carry an existing entry over unchanged.
    pub fn copied(entry: &IFDEntry) -> Self {
        NewEntry {
            tag: entry.tag,
            format: entry.format,
            count: entry.n_components,
            value: EntryValue::Field(entry.value_field),
        }
    }

    fn with_bytes(tag: IFDTag, format: IFDDataFormat, count: u32, bytes: Vec<u8>) -> Self {
        let value = if bytes.len() <= 4 {
            let mut field = [0u8; 4];
            field[..bytes.len()].copy_from_slice(&bytes);
            EntryValue::Field(field)
        } else {
            EntryValue::Data(bytes)
        };
        NewEntry {
            tag: tag.code(),
            format: format.code(),
            count,
            value,
        }
    }

    pub fn bytes(tag: IFDTag, bytes: &[u8]) -> Self {
        Self::with_bytes(tag, IFDDataFormat::UnsignedByte, bytes.len() as u32, bytes.to_vec())
    }

    /// A NUL-terminated ASCII string.
    pub fn ascii(tag: IFDTag, text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        Self::with_bytes(tag, IFDDataFormat::AsciiString, bytes.len() as u32, bytes)
    }

    pub fn long(tag: IFDTag, value: u32, alignment: TIFFByteAlignment) -> Self {
        let bytes = alignment.encode_u32(value).to_vec();
        Self::with_bytes(tag, IFDDataFormat::UnsignedLong, 1, bytes)
    }

    pub fn rationals(tag: IFDTag, values: &[(u32, u32)], alignment: TIFFByteAlignment) -> Self {
        let bytes = values
            .iter()
            .flat_map(|&(num, denom)| {
                let mut pair = alignment.encode_u32(num).to_vec();
                pair.extend_from_slice(&alignment.encode_u32(denom));
                pair
            })
            .collect();
        Self::with_bytes(tag, IFDDataFormat::UnsignedRational, values.len() as u32, bytes)
    }
}

/// Pad `out` to an even length; TIFF wants IFDs and values on word boundaries.
pub fn pad_to_word(out: &mut Vec<u8>) {
    if out.len() % 2 == 1 {
        out.push(0);
    }
}

/// Append an IFD holding `entries` (sorted by tag, as TIFF requires) followed by its out-of-line
/// values. Returns the offset of the IFD from the start of `out`, which must be the start of the
/// TIFF header.
pub fn append_ifd(
    out: &mut Vec<u8>,
    mut entries: Vec<NewEntry>,
    next: u32,
    alignment: TIFFByteAlignment,
) -> Result<u32, MetadataError> {
    pad_to_word(out);
    entries.sort_by_key(|e| e.tag);

    let start = out.len();
    let count = u16::try_from(entries.len()).map_err(|_| MetadataError::SegmentTooLarge(start))?;
    let mut data_offset = start + 2 + 12 * entries.len() + 4;
    let mut values = Vec::new();

    out.extend_from_slice(&alignment.encode_u16(count));
    for entry in entries {
        out.extend_from_slice(&alignment.encode_u16(entry.tag));
        out.extend_from_slice(&alignment.encode_u16(entry.format));
        out.extend_from_slice(&alignment.encode_u32(entry.count));
        match entry.value {
            EntryValue::Field(field) => out.extend_from_slice(&field),
            EntryValue::Data(bytes) => {
                out.extend_from_slice(&alignment.encode_u32(offset(data_offset)?));
                data_offset += bytes.len() + bytes.len() % 2;
                values.push(bytes);
            }
        }
    }
    out.extend_from_slice(&alignment.encode_u32(next));

    for bytes in values {
        out.extend_from_slice(&bytes);
        pad_to_word(out);
    }

    offset(start)
}

fn offset(pos: usize) -> Result<u32, MetadataError> {
    u32::try_from(pos).map_err(|_| MetadataError::SegmentTooLarge(pos))
}

// GPS tags this writer owns. Whatever else the GPS IFD holds is copied over.
fn is_coordinate_tag(tag: u16, with_altitude: bool) -> bool {
    match IFDTag::from_code(tag) {
        IFDTag::GPSLatitudeRef
        | IFDTag::GPSLatitude
        | IFDTag::GPSLongitudeRef
        | IFDTag::GPSLongitude => true,
        IFDTag::GPSAltitudeRef | IFDTag::GPSAltitude => with_altitude,
        _ => false,
    }
}

/// Return a copy of `tiff` (the TIFF block `exif` was parsed from) that records `position` in its
/// GPS IFD.
pub fn insert_gps(
    tiff: &[u8],
    exif: &ExifData,
    position: &Position,
) -> Result<Vec<u8>, MetadataError> {
    let alignment = exif.tiff_header.alignment;
    let with_altitude = position.elevation.is_some();
    let mut out = tiff.to_vec();

    let mut gps_entries: Vec<NewEntry> = exif
        .gps_ifd
        .iter()
        .flat_map(|ifd| ifd.entries.iter())
        .filter(|e| !is_coordinate_tag(e.tag, with_altitude))
        .map(NewEntry::copied)
        .collect();

    if !gps_entries.iter().any(|e| e.tag == IFDTag::GPSVersionID.code()) {
        gps_entries.push(NewEntry::bytes(IFDTag::GPSVersionID, &[2, 3, 0, 0]));
    }
    gps_entries.push(NewEntry::ascii(
        IFDTag::GPSLatitudeRef,
        gps::latitude_ref(position.latitude),
    ));
    gps_entries.push(NewEntry::rationals(
        IFDTag::GPSLatitude,
        &gps::decimal_to_rationals(position.latitude),
        alignment,
    ));
    gps_entries.push(NewEntry::ascii(
        IFDTag::GPSLongitudeRef,
        gps::longitude_ref(position.longitude),
    ));
    gps_entries.push(NewEntry::rationals(
        IFDTag::GPSLongitude,
        &gps::decimal_to_rationals(position.longitude),
        alignment,
    ));
    if let Some(elevation) = position.elevation {
        let below_sea_level = if elevation < 0.0 { 1 } else { 0 };
        let centimetres = (elevation.abs() * f64::from(gps::ALTITUDE_DENOMINATOR)).round();
        let centimetres = if centimetres > f64::from(u32::MAX) {
            u32::MAX
        } else {
            centimetres as u32
        };
        gps_entries.push(NewEntry::bytes(IFDTag::GPSAltitudeRef, &[below_sea_level]));
        gps_entries.push(NewEntry::rationals(
            IFDTag::GPSAltitude,
            &[(centimetres, gps::ALTITUDE_DENOMINATOR)],
            alignment,
        ));
    }
    let gps_offset = append_ifd(&mut out, gps_entries, 0, alignment)?;

    let mut ifd0_entries: Vec<NewEntry> = exif
        .ifd0
        .entries
        .iter()
        .filter(|e| e.tag != IFDTag::GPSInfo.code())
        .map(NewEntry::copied)
        .collect();
    ifd0_entries.push(NewEntry::long(IFDTag::GPSInfo, gps_offset, alignment));
    let next = exif.ifd0.offset_to_next.unwrap_or(0);
    let ifd0_offset = append_ifd(&mut out, ifd0_entries, next, alignment)?;

    out[4..8].copy_from_slice(&alignment.encode_u32(ifd0_offset));
    Ok(out)
}
