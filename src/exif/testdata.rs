//! Synthetic TIFF blocks and JPEG files for tests.

use super::{gps, write::append_ifd, write::NewEntry, IFDTag, TIFFByteAlignment};

/// Builds a TIFF block with an IFD0, and an Exif and GPS IFD when they have entries.
pub struct TiffBuilder {
    alignment: TIFFByteAlignment,
    ifd0: Vec<NewEntry>,
    exif: Vec<NewEntry>,
    gps: Vec<NewEntry>,
}

impl TiffBuilder {
    pub fn new(alignment: TIFFByteAlignment) -> Self {
        TiffBuilder {
            alignment,
            ifd0: Vec::new(),
            exif: Vec::new(),
            gps: Vec::new(),
        }
    }

    pub fn make(mut self, make: &str) -> Self {
        self.ifd0.push(NewEntry::ascii(IFDTag::Make, make));
        self
    }

    pub fn date_time_original(mut self, date_time: &str) -> Self {
        self.exif.push(NewEntry::ascii(IFDTag::DateTimeOriginal, date_time));
        self
    }

    pub fn sub_sec_time_original(mut self, sub_sec: &str) -> Self {
        self.exif.push(NewEntry::ascii(IFDTag::SubSecTimeOriginal, sub_sec));
        self
    }

    pub fn offset_time_original(mut self, offset: &str) -> Self {
        self.exif.push(NewEntry::ascii(IFDTag::OffsetTimeOriginal, offset));
        self
    }

    pub fn gps_map_datum(mut self, datum: &str) -> Self {
        self.gps.push(NewEntry::ascii(IFDTag::GPSMapDatum, datum));
        self
    }

    pub fn gps(mut self, latitude: f64, longitude: f64) -> Self {
        let alignment = self.alignment;
        self.gps.extend(vec![
            NewEntry::ascii(IFDTag::GPSLatitudeRef, gps::latitude_ref(latitude)),
            NewEntry::rationals(
                IFDTag::GPSLatitude,
                &gps::decimal_to_rationals(latitude),
                alignment,
            ),
            NewEntry::ascii(IFDTag::GPSLongitudeRef, gps::longitude_ref(longitude)),
            NewEntry::rationals(
                IFDTag::GPSLongitude,
                &gps::decimal_to_rationals(longitude),
                alignment,
            ),
        ]);
        self
    }

    /// Add an arbitrary entry to the GPS IFD.
    pub fn gps_entry(mut self, entry: NewEntry) -> Self {
        self.gps.push(entry);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let alignment = self.alignment;
        let mut out = alignment.signature().to_vec();
        out.extend_from_slice(&alignment.encode_u16(0x002a));
        out.extend_from_slice(&[0; 4]);

        let mut ifd0 = self.ifd0;
        if !self.exif.is_empty() {
            let offset = append_ifd(&mut out, self.exif, 0, alignment).unwrap();
            ifd0.push(NewEntry::long(IFDTag::ExifOffset, offset, alignment));
        }
        if !self.gps.is_empty() {
            let offset = append_ifd(&mut out, self.gps, 0, alignment).unwrap();
            ifd0.push(NewEntry::long(IFDTag::GPSInfo, offset, alignment));
        }
        let offset = append_ifd(&mut out, ifd0, 0, alignment).unwrap();
        out[4..8].copy_from_slice(&alignment.encode_u32(offset));
        out
    }
}

fn segment(marker: u8, data: &[u8]) -> Vec<u8> {
    let mut out = vec![0xff, marker];
    out.extend_from_slice(&(data.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Entropy-coded bytes placed after SOS, including a stuffed 0xff.
pub const SCAN_DATA: &[u8] = b"\x12\x34\xff\x00\x56\x78";

/// A structurally valid JPEG file: SOI, APP0, APP1 holding `tiff` (if any), a COM segment, DQT,
/// SOS, some scan data and EOI.
pub fn jpeg(tiff: Option<&[u8]>) -> Vec<u8> {
    let mut out = vec![0xff, 0xd8];
    out.extend(segment(0xe0, b"JFIF\x00\x01\x01\x00\x00\x01\x00\x01\x00\x00"));
    if let Some(tiff) = tiff {
        let mut data = b"Exif\x00\x00".to_vec();
        data.extend_from_slice(tiff);
        out.extend(segment(0xe1, &data));
    }
    out.extend(segment(0xfe, b"holiday snaps"));
    let mut dqt = vec![0u8];
    dqt.extend_from_slice(&[1u8; 64]);
    out.extend(segment(0xdb, &dqt));
    out.extend(segment(0xda, &[0x01, 0x01, 0x00, 0x00, 0x3f, 0x00]));
    out.extend_from_slice(SCAN_DATA);
    out.extend_from_slice(&[0xff, 0xd9]);
    out
}

/// A JPEG file whose Exif block says it was taken at `date_time` (Exif format).
pub fn photo_taken_at(date_time: &str) -> Vec<u8> {
    let tiff = TiffBuilder::new(TIFFByteAlignment::LittleEndian)
        .make("Acme")
        .date_time_original(date_time)
        .build();
    jpeg(Some(&tiff))
}
