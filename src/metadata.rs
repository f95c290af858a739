//! Reading capture times and coordinates from photos, and writing coordinates back.

use crate::{
    error::MetadataError,
    exif::{gps, write, ExifData},
    jfif::JFIFMarkerCode,
    parse,
    time::CaptureTime,
    track::Position,
    JPEGFile,
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

/// What the tagger needs to know about a photo.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub path: PathBuf,
    pub capture_time: Option<CaptureTime>,
    /// Coordinate already stored in the photo.
    pub position: Option<Position>,
}

/// Access to photo metadata. Both calls fail for the one photo only.
pub trait MetadataStore {
    fn read(&self, path: &Path) -> Result<PhotoRecord, MetadataError>;

    /// Store `position` in the photo's GPS fields, leaving all other metadata as it was.
    fn write(&self, path: &Path, position: &Position) -> Result<(), MetadataError>;
}

/// Metadata store for JPEG files, working on their Exif segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegExifStore;

impl JpegExifStore {
    pub fn new() -> Self {
        JpegExifStore
    }

    /// Read the record of a photo already loaded into memory.
    pub fn read_bytes(path: &Path, data: &[u8]) -> Result<PhotoRecord, MetadataError> {
        let file = parse_jpeg(data)?;

        let (capture_time, position) = match file.exif() {
            None => (None, None),
            Some((_, exif)) => (exif.capture_time(), existing_position(exif)?),
        };

        Ok(PhotoRecord {
            path: path.to_path_buf(),
            capture_time,
            position,
        })
    }

    /// Return a copy of the JPEG file `data` with `position` added to its Exif data. Only the
    /// Exif segment changes, and within it only by appending (see `exif::write`).
    pub fn geotag_bytes(data: &[u8], position: &Position) -> Result<Vec<u8>, MetadataError> {
        let file = parse_jpeg(data)?;
        let (span, exif) = file.exif().ok_or(MetadataError::NoExif)?;

        // Marker, size field, then the Exif header
        let tiff_start = span.start + 4 + ExifData::HEADER.len();
        let tiff = &data[tiff_start..span.end()];
        let new_tiff = write::insert_gps(tiff, exif, position)?;

        let size_field = 2 + ExifData::HEADER.len() + new_tiff.len();
        if size_field > usize::from(u16::MAX) {
            return Err(MetadataError::SegmentTooLarge(size_field));
        }

        let mut out = Vec::with_capacity(data.len() + new_tiff.len() - tiff.len());
        out.extend_from_slice(&data[..span.start]);
        out.extend_from_slice(&JFIFMarkerCode::APPm(1).as_bytes());
        out.extend_from_slice(&(size_field as u16).to_be_bytes());
        out.extend_from_slice(ExifData::HEADER);
        out.extend_from_slice(&new_tiff);
        out.extend_from_slice(&data[span.end()..]);
        Ok(out)
    }
}

impl MetadataStore for JpegExifStore {
    fn read(&self, path: &Path) -> Result<PhotoRecord, MetadataError> {
        let data = fs::read(path)?;
        Self::read_bytes(path, &data)
    }

    fn write(&self, path: &Path, position: &Position) -> Result<(), MetadataError> {
        let data = fs::read(path)?;
        let out = Self::geotag_bytes(&data, position)?;

        // Write next to the original so the final rename stays on one file system
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&out)?;
        tmp.as_file().sync_all()?;
        tmp.as_file().set_permissions(fs::metadata(path)?.permissions())?;
        tmp.persist(path).map_err(|e| e.error)?;

        debug!(
            "{}: wrote GPS data ({} -> {} bytes)",
            path.display(),
            data.len(),
            out.len()
        );
        Ok(())
    }
}

fn parse_jpeg(data: &[u8]) -> Result<JPEGFile, MetadataError> {
    if !data.starts_with(&JFIFMarkerCode::SOI.as_bytes()) {
        return Err(MetadataError::NotJpeg);
    }
    match JPEGFile::parse(data) {
        Ok((_, file)) => Ok(file),
        Err(e) => Err(MetadataError::Parse(parse::pretty_error_message(data, e))),
    }
}

// A coordinate that is there but can't be decoded still counts as location data; reporting it as
// an error keeps the photo from being overwritten.
fn existing_position(exif: &ExifData) -> Result<Option<Position>, MetadataError> {
    let gps_ifd = match &exif.gps_ifd {
        Some(ifd) if gps::has_coordinate(ifd) => ifd,
        _ => return Ok(None),
    };
    match gps::read_position(gps_ifd) {
        Some(position) => Ok(Some(position)),
        None => Err(MetadataError::Parse(
            "GPS coordinate present but unreadable".to_string(),
        )),
    }
}
