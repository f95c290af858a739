//! Parsing for the Exif data structure.

pub mod gps;
mod tags;
pub mod write;

#[cfg(test)]
pub(crate) mod testdata;

pub use tags::IFDTag;

use crate::{
    impl_parse_for_enum,
    jfif::{JFIFMarkerCode, ParseableSegment},
    parse,
    time::CaptureTime,
};
use derive_try_from_primitive::TryFromPrimitive;
use nom::{
    bytes::complete::{tag, take},
    error::context,
    sequence::tuple,
};
use std::convert::TryFrom;

/// The Exif data structure containing the metadata specified in an Exif section: the primary
/// image's IFD and the Exif and GPS sub-IFDs it points to.
#[derive(Debug)]
pub struct ExifData {
    pub data_size: usize,
    pub tiff_header: TIFFHeader,
    pub ifd0: IFD,
    pub exif_ifd: Option<IFD>,
    pub gps_ifd: Option<IFD>,
}

impl ExifData {
    const MARKER: JFIFMarkerCode = JFIFMarkerCode::APPm(0x01);

    /// Bytes between the segment's size field and the TIFF header.
    pub const HEADER: &'static [u8] = b"Exif\x00\x00";

    /// Parse the TIFF structure that makes up the body of an Exif segment.
    pub fn parse_tiff(tiff: parse::Input, data_size: usize) -> parse::Result<Self> {
        let (_, tiff_header) = context("TIFF header", TIFFHeader::parse)(tiff)?;
        let alignment = tiff_header.alignment;

        let (_, ifd0) = context("IFD0", |x| {
            IFD::parse(x, tiff_header.initial_offset, alignment)
        })(tiff)?;

        let (_, exif_ifd) =
            IFD::parse_sub_ifd(tiff, &ifd0, IFDTag::ExifOffset, "Exif IFD", alignment)?;
        let (_, gps_ifd) = IFD::parse_sub_ifd(tiff, &ifd0, IFDTag::GPSInfo, "GPS IFD", alignment)?;

        let exif_data = ExifData {
            data_size,
            tiff_header,
            ifd0,
            exif_ifd,
            gps_ifd,
        };
        Ok((&tiff[tiff.len()..], exif_data))
    }

    /// Look a tag up in the Exif IFD first, then in IFD0.
    pub fn find(&self, tag: IFDTag) -> Option<&IFDEntry> {
        self.exif_ifd
            .as_ref()
            .and_then(|ifd| ifd.find(tag))
            .or_else(|| self.ifd0.find(tag))
    }

    /// The time the photo was taken, from `DateTimeOriginal` and its companion tags.
    pub fn capture_time(&self) -> Option<CaptureTime> {
        let date_time = self.find(IFDTag::DateTimeOriginal)?.as_str()?;
        let sub_sec = self.find(IFDTag::SubSecTimeOriginal).and_then(IFDEntry::as_str);
        let offset = self.find(IFDTag::OffsetTimeOriginal).and_then(IFDEntry::as_str);
        CaptureTime::from_exif(date_time, sub_sec, offset)
    }

    /// Verify that the data section contains the correct header bytes.
    fn parse_data_bytes_header(i: parse::Input) -> parse::Result<&[u8]> {
        context("Exif data section header", tag(Self::HEADER))(i)
    }
}

impl ParseableSegment for ExifData {
    fn can_parse_segment(i: parse::Input) -> bool {
        use nom::number::complete::be_u16;

        // We should be able to parse this segment if the first few bytes match the following
        // pattern:
        //
        //      APP1 header + 2 size bytes + "Exif\x00\x00"
        //
        let mut parser = tuple((
            tag(Self::MARKER.as_bytes()),
            be_u16,
            Self::parse_data_bytes_header,
        ));
        parser(i).is_ok()
    }

    fn marker(&self) -> JFIFMarkerCode {
        Self::MARKER
    }

    fn data_size(&self) -> Option<usize> {
        Some(self.data_size)
    }

    fn parse_data_bytes(
        i: parse::Input,
        _magic: JFIFMarkerCode,
        data_size: usize,
    ) -> parse::Result<Self> {
        let (tiff, _) = Self::parse_data_bytes_header(i)?;
        Self::parse_tiff(tiff, data_size)
    }
}

/// TIFF header used within the Exif data structure to specify its layout.
#[derive(Debug)]
pub struct TIFFHeader {
    pub alignment: TIFFByteAlignment,
    pub initial_offset: u32,
}

impl TIFFHeader {
    pub fn parse(i: parse::Input) -> parse::Result<Self> {
        use nom::combinator::verify;

        let (i, alignment) = context("Byte alignment", TIFFByteAlignment::parse)(i)?;
        let (i, _) = context(
            "Alignment check",
            verify(|x| alignment.parse_u16(x), |&x| x == 0x002a),
        )(i)?;
        let (i, initial_offset) = context("Initial offset", |x| alignment.parse_u32(x))(i)?;

        Ok((
            i,
            TIFFHeader {
                alignment,
                initial_offset,
            },
        ))
    }
}

/// Two-byte tag representing the byte alignment for the TIFF data.
#[derive(Debug, Clone, Copy, TryFromPrimitive, PartialEq, Eq)]
#[repr(u16)]
pub enum TIFFByteAlignment {
    LittleEndian = 0x4949, // "II" = Intel-type byte alignment
    BigEndian = 0x4d4d,    // "MM" = Motorola-type byte alignment
}

macro_rules! TIFFByteAlignment_parse_numeric {
    ($fn_name: ident, $type: ident, $le_number_parser: ident, $be_number_parser: ident) => {
        impl TIFFByteAlignment {
            pub fn $fn_name<'a>(&self, i: parse::Input<'a>) -> parse::Result<'a, $type> {
                use nom::number::complete::{$be_number_parser, $le_number_parser};
                match self {
                    TIFFByteAlignment::LittleEndian => $le_number_parser(i),
                    TIFFByteAlignment::BigEndian => $be_number_parser(i),
                }
            }
        }
    };
}

impl_parse_for_enum!(TIFFByteAlignment, be_u16);
TIFFByteAlignment_parse_numeric!(parse_u8, u8, le_u8, be_u8);
TIFFByteAlignment_parse_numeric!(parse_i8, i8, le_i8, be_i8);
TIFFByteAlignment_parse_numeric!(parse_u16, u16, le_u16, be_u16);
TIFFByteAlignment_parse_numeric!(parse_i16, i16, le_i16, be_i16);
TIFFByteAlignment_parse_numeric!(parse_u32, u32, le_u32, be_u32);
TIFFByteAlignment_parse_numeric!(parse_i32, i32, le_i32, be_i32);
TIFFByteAlignment_parse_numeric!(parse_f32, f32, le_f32, be_f32);
TIFFByteAlignment_parse_numeric!(parse_f64, f64, le_f64, be_f64);

impl TIFFByteAlignment {
    pub fn encode_u16(&self, x: u16) -> [u8; 2] {
        match self {
            TIFFByteAlignment::LittleEndian => x.to_le_bytes(),
            TIFFByteAlignment::BigEndian => x.to_be_bytes(),
        }
    }

    pub fn encode_u32(&self, x: u32) -> [u8; 4] {
        match self {
            TIFFByteAlignment::LittleEndian => x.to_le_bytes(),
            TIFFByteAlignment::BigEndian => x.to_be_bytes(),
        }
    }

    pub fn signature(&self) -> [u8; 2] {
        (*self as u16).to_be_bytes()
    }
}

/// Encapsulates an IFD (Image File Directory) in the image metadata.
#[derive(Debug)]
pub struct IFD {
    /// Offset of the IFD from the start of the TIFF header.
    pub offset: u32,
    pub entries: Vec<IFDEntry>,
    pub offset_to_next: Option<u32>,
}

impl IFD {
    /// Parse the IFD located `offset` bytes into `tiff`.
    pub fn parse<'a>(
        tiff: parse::Input<'a>,
        offset: u32,
        alignment: TIFFByteAlignment,
    ) -> parse::Result<'a, Self> {
        let (i, ()) = context("IFD offset", |x| parse::seek(x, offset))(tiff)?;
        let (i, num_entries) = context("Number of IFD entries", |x| alignment.parse_u16(x))(i)?;
        let mut entries = Vec::with_capacity(num_entries as usize);
        let mut current_input = i;

        for _ in 0..num_entries {
            let (next_i, entry) = context("IFD entry", |i| {
                IFDEntry::parse(i, tiff, alignment)
            })(current_input)?;
            current_input = next_i;
            entries.push(entry);
        }

        let i = current_input;
        let (i, offset_to_next) = context("Offset to next IFD", |x| alignment.parse_u32(x))(i)?;
        let offset_to_next = if offset_to_next == 0 {
            None
        } else {
            Some(offset_to_next)
        };

        let ifd = IFD {
            offset,
            entries,
            offset_to_next,
        };
        Ok((i, ifd))
    }

    /// Parse the sub-IFD that `parent`'s entry `tag` points to, if it has one.
    pub fn parse_sub_ifd<'a>(
        tiff: parse::Input<'a>,
        parent: &IFD,
        tag: IFDTag,
        name: &'static str,
        alignment: TIFFByteAlignment,
    ) -> parse::Result<'a, Option<Self>> {
        match parent.find(tag).and_then(IFDEntry::as_offset) {
            Some(offset) => {
                let (i, ifd) = context(name, |x| IFD::parse(x, offset, alignment))(tiff)?;
                Ok((i, Some(ifd)))
            }
            None => Ok((tiff, None)),
        }
    }

    pub fn find(&self, tag: IFDTag) -> Option<&IFDEntry> {
        self.entries.iter().find(|e| e.tag == tag.code())
    }
}

/// Represents a single IFD (Image File Directory) entry
#[derive(Debug, Clone)]
pub struct IFDEntry {
    pub tag: u16,
    /// Raw format code; `data_format` is `None` when the code isn't one we know.
    pub format: u16,
    pub data_format: Option<IFDDataFormat>,
    pub n_components: u32,
    /// The entry's last four bytes, exactly as stored: either the value itself or the offset of
    /// the value.
    pub value_field: [u8; 4],
    pub content: Vec<IFDDataContents>,
}

impl IFDEntry {
    pub fn parse<'a>(
        i: parse::Input<'a>,
        tiff: parse::Input<'a>,
        alignment: TIFFByteAlignment,
    ) -> parse::Result<'a, Self> {
        let (i, (tag, format, n_components, value_field)) = tuple((
            context("IFD tag", |x| alignment.parse_u16(x)),
            context("Data format", |x| alignment.parse_u16(x)),
            context("Number of components", |x| alignment.parse_u32(x)),
            context("Value field", take(4usize)),
        ))(i)?;

        let data_format = IFDDataFormat::try_from(format).ok();
        let content = match data_format {
            Some(data_format) => {
                Self::parse_content(value_field, tiff, data_format, n_components, alignment)
            }
            None => Vec::new(),
        };

        let mut raw_value = [0u8; 4];
        raw_value.copy_from_slice(value_field);

        Ok((
            i,
            IFDEntry {
                tag,
                format,
                data_format,
                n_components,
                value_field: raw_value,
                content,
            },
        ))
    }

    // If the total data size is <= 4 bytes, then the data is stored within the value field.
    // Otherwise the value field holds an offset, and we have to extract the value by visiting that
    // offset. Contents we can't reach (broken maker notes are common) are left empty rather than
    // failing the whole structure.
    fn parse_content<'a>(
        value_field: parse::Input<'a>,
        tiff: parse::Input<'a>,
        data_format: IFDDataFormat,
        n_components: u32,
        alignment: TIFFByteAlignment,
    ) -> Vec<IFDDataContents> {
        let content_size = data_format.bytes_per_component() as u64 * u64::from(n_components);

        let data = if content_size <= 4 {
            Ok(value_field)
        } else {
            alignment
                .parse_u32(value_field)
                .and_then(|(_, offset)| parse::seek(tiff, offset))
                .map(|(data, ())| data)
        };

        data.ok()
            .and_then(|data| {
                IFDDataContents::parse(data, data_format, n_components, alignment).ok()
            })
            .map(|(_, content)| content)
            .unwrap_or_default()
    }

    /// The entry's text, for ASCII entries.
    pub fn as_str(&self) -> Option<&str> {
        match self.content.get(0) {
            Some(IFDDataContents::AsciiString(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The entry's value as an offset, for the LONG entries that point at sub-IFDs.
    pub fn as_offset(&self) -> Option<u32> {
        match self.content.get(0) {
            Some(IFDDataContents::UnsignedLong(offset)) => Some(*offset),
            _ => None,
        }
    }
}

/// Represents all of the possible values that an IFD data format can adopt.
#[derive(Debug, Clone, Copy, Eq, PartialEq, TryFromPrimitive)]
#[repr(u16)]
pub enum IFDDataFormat {
    UnsignedByte = 1,
    AsciiString = 2,
    UnsignedShort = 3,
    UnsignedLong = 4,
    UnsignedRational = 5,
    SignedByte = 6,
    Undefined = 7,
    SignedShort = 8,
    SignedLong = 9,
    SignedRational = 10,
    SingleFloat = 11,
    DoubleFloat = 12,
}

impl IFDDataFormat {
    pub fn bytes_per_component(&self) -> usize {
        match self {
            IFDDataFormat::UnsignedByte => 1,
            IFDDataFormat::AsciiString => 1,
            IFDDataFormat::UnsignedShort => 2,
            IFDDataFormat::UnsignedLong => 4,
            IFDDataFormat::UnsignedRational => 8,
            IFDDataFormat::SignedByte => 1,
            IFDDataFormat::Undefined => 1,
            IFDDataFormat::SignedShort => 2,
            IFDDataFormat::SignedLong => 4,
            IFDDataFormat::SignedRational => 8,
            IFDDataFormat::SingleFloat => 4,
            IFDDataFormat::DoubleFloat => 8,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IFDDataContents {
    UnsignedByte(u8),
    AsciiString(String),
    UnsignedShort(u16),
    UnsignedLong(u32),
    UnsignedRational(u32, u32),
    SignedByte(i8),
    Undefined(Vec<u8>),
    SignedShort(i16),
    SignedLong(i32),
    SignedRational(i32, i32),
    SingleFloat(f32),
    DoubleFloat(f64),
}

impl IFDDataContents {
    pub fn parse(
        i: parse::Input,
        format: IFDDataFormat,
        n_components: u32,
        alignment: TIFFByteAlignment,
    ) -> parse::Result<Vec<Self>> {
        let size = format.bytes_per_component() * (n_components as usize);
        let (rest, data) = context("IFD entry contents", take(size))(i)?;

        let contents = match format {
            // For both of these formats, n_components is the number of characters/bytes in one
            // value rather than a number of values.
            IFDDataFormat::AsciiString => {
                let text = data.split(|&b| b == 0).next().unwrap_or(data);
                vec![IFDDataContents::AsciiString(String::from_utf8_lossy(text).to_string())]
            }
            IFDDataFormat::Undefined => vec![IFDDataContents::Undefined(data.to_vec())],
            _ => {
                let mut contents = Vec::with_capacity(n_components as usize);
                let mut i = data;
                for _ in 0..n_components {
                    let (next_i, res) = Self::parse_one(i, format, alignment)?;
                    i = next_i;
                    contents.push(res);
                }
                contents
            }
        };
        Ok((rest, contents))
    }

    /// Parse a single value of a fixed-size data format.
    fn parse_one(
        i: parse::Input,
        format: IFDDataFormat,
        alignment: TIFFByteAlignment,
    ) -> parse::Result<Self> {
        match format {
            IFDDataFormat::UnsignedByte => {
                let (i, x) = alignment.parse_u8(i)?;
                Ok((i, IFDDataContents::UnsignedByte(x)))
            }
            IFDDataFormat::UnsignedShort => {
                let (i, x) = alignment.parse_u16(i)?;
                Ok((i, IFDDataContents::UnsignedShort(x)))
            }
            IFDDataFormat::UnsignedLong => {
                let (i, x) = alignment.parse_u32(i)?;
                Ok((i, IFDDataContents::UnsignedLong(x)))
            }
            IFDDataFormat::UnsignedRational => {
                let (i, (num, denom)) =
                    tuple((|x| alignment.parse_u32(x), |x| alignment.parse_u32(x)))(i)?;
                Ok((i, IFDDataContents::UnsignedRational(num, denom)))
            }
            IFDDataFormat::SignedByte => {
                let (i, x) = alignment.parse_i8(i)?;
                Ok((i, IFDDataContents::SignedByte(x)))
            }
            IFDDataFormat::SignedShort => {
                let (i, x) = alignment.parse_i16(i)?;
                Ok((i, IFDDataContents::SignedShort(x)))
            }
            IFDDataFormat::SignedLong => {
                let (i, x) = alignment.parse_i32(i)?;
                Ok((i, IFDDataContents::SignedLong(x)))
            }
            IFDDataFormat::SignedRational => {
                let (i, (num, denom)) =
                    tuple((|x| alignment.parse_i32(x), |x| alignment.parse_i32(x)))(i)?;
                Ok((i, IFDDataContents::SignedRational(num, denom)))
            }
            IFDDataFormat::SingleFloat => {
                let (i, x) = alignment.parse_f32(i)?;
                Ok((i, IFDDataContents::SingleFloat(x)))
            }
            IFDDataFormat::DoubleFloat => {
                let (i, x) = alignment.parse_f64(i)?;
                Ok((i, IFDDataContents::DoubleFloat(x)))
            }
            // Variable-length formats are handled by `parse`
            IFDDataFormat::AsciiString | IFDDataFormat::Undefined => {
                let (i, data) = take(1usize)(i)?;
                Ok((i, IFDDataContents::Undefined(data.to_vec())))
            }
        }
    }
}

impl TryFrom<&IFDDataContents> for f64 {
    type Error = &'static str;

    fn try_from(data: &IFDDataContents) -> Result<Self, Self::Error> {
        match data {
            IFDDataContents::UnsignedByte(x) => Ok(*x as f64),
            IFDDataContents::UnsignedShort(x) => Ok(*x as f64),
            IFDDataContents::UnsignedLong(x) => Ok(*x as f64),
            IFDDataContents::SignedByte(x) => Ok(*x as f64),
            IFDDataContents::SignedShort(x) => Ok(*x as f64),
            IFDDataContents::SignedLong(x) => Ok(*x as f64),
            IFDDataContents::SingleFloat(x) => Ok(*x as f64),
            IFDDataContents::DoubleFloat(x) => Ok(*x),
            IFDDataContents::UnsignedRational(x, y) => Ok((*x as f64) / (*y as f64)),
            IFDDataContents::SignedRational(x, y) => Ok((*x as f64) / (*y as f64)),
            _ => Err("Cannot convert data type to f64"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{testdata::TiffBuilder, ExifData, IFDTag, TIFFByteAlignment, TIFFHeader};
    use chrono::NaiveDate;

    #[test]
    fn test_parse_tiff_header() {
        // Use big-endian byte alignment
        let data = b"MM\x00\x2a\x00\x00\x00\x08";
        let (_, header) = TIFFHeader::parse(data).unwrap();
        assert_eq!(header.alignment, TIFFByteAlignment::BigEndian);
        assert_eq!(header.initial_offset, 8);

        // Use little-endian byte alignment
        let data = b"II\x2a\x00\xff\x11\x00\x00";
        let (_, header) = TIFFHeader::parse(data).unwrap();
        assert_eq!(header.alignment, TIFFByteAlignment::LittleEndian);
        assert_eq!(header.initial_offset, 0x11ff);

        // The following example should result in an error since the magic bytes 0x002a are in the
        // wrong order. In this example the mode is little-endian, so they ought to be saved as
        // \x2a\x00, not the other way around.
        let data = b"II\x00\x2a\xff\x11\x00\x00";
        assert!(TIFFHeader::parse(data).is_err());
    }

    #[test]
    fn test_parse_tiff_in_both_byte_orders() {
        for &alignment in &[TIFFByteAlignment::LittleEndian, TIFFByteAlignment::BigEndian] {
            let tiff = TiffBuilder::new(alignment)
                .make("Acme")
                .date_time_original("2023:06:01 10:05:00")
                .build();

            let (_, exif) = ExifData::parse_tiff(&tiff, tiff.len()).unwrap();
            assert_eq!(exif.tiff_header.alignment, alignment);
            assert_eq!(exif.ifd0.find(IFDTag::Make).and_then(|e| e.as_str()), Some("Acme"));
            assert!(exif.exif_ifd.is_some());
            assert!(exif.gps_ifd.is_none());

            let capture = exif.capture_time().unwrap();
            let expected = NaiveDate::from_ymd_opt(2023, 6, 1)
                .unwrap()
                .and_hms_opt(10, 5, 0)
                .unwrap();
            assert_eq!(capture.local, expected);
            assert_eq!(capture.offset, None);
        }
    }

    #[test]
    fn test_missing_capture_time() {
        let tiff = TiffBuilder::new(TIFFByteAlignment::LittleEndian)
            .make("Acme")
            .build();
        let (_, exif) = ExifData::parse_tiff(&tiff, tiff.len()).unwrap();
        assert!(exif.exif_ifd.is_none());
        assert!(exif.capture_time().is_none());
    }

    #[test]
    fn test_dangling_ifd_offset_is_an_error() {
        let mut tiff = TiffBuilder::new(TIFFByteAlignment::BigEndian)
            .make("Acme")
            .build();
        // Point IFD0 past the end of the data
        tiff[4..8].copy_from_slice(&0x4000u32.to_be_bytes());
        assert!(ExifData::parse_tiff(&tiff, tiff.len()).is_err());

        // Cut the IFD off half-way through its entries
        let tiff = TiffBuilder::new(TIFFByteAlignment::BigEndian)
            .make("Acme")
            .build();
        assert!(ExifData::parse_tiff(&tiff[..14], 14).is_err());
    }
}
