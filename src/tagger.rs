//! Tagging a folder of photos against a track.

use crate::{
    error::TagError,
    metadata::MetadataStore,
    time::TimeAlignment,
    track::{Position, TrackIndex},
};
use serde::Serialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Why a photo was left alone. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The photo already records a location; it is never overwritten.
    AlreadyTagged,
    /// The photo was taken before the track starts or after it ends.
    OutsideTrack,
    /// The photo has no usable capture time.
    NoCaptureTime,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            SkipReason::AlreadyTagged => "already tagged",
            SkipReason::OutsideTrack => "outside track time range",
            SkipReason::NoCaptureTime => "no capture time",
        };
        f.write_str(text)
    }
}

/// What happened to one photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Tagged(Position),
    Skipped(SkipReason),
    Failed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Tagged(p) => write!(f, "tagged ({:.6}, {:.6})", p.latitude, p.longitude),
            Outcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            Outcome::Failed(reason) => write!(f, "error: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoOutcome {
    pub path: PathBuf,
    pub outcome: Outcome,
}

/// Every photo of a batch with its outcome, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Set when nothing was written; `Tagged` then means "would tag".
    pub dry_run: bool,
    pub tagged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub photos: Vec<PhotoOutcome>,
}

impl BatchReport {
    fn push(&mut self, path: PathBuf, outcome: Outcome) {
        match outcome {
            Outcome::Tagged(_) => self.tagged += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
        self.photos.push(PhotoOutcome { path, outcome });
    }
}

impl fmt::Display for PhotoOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} : {}", self.path.display(), self.outcome)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for photo in &self.photos {
            match (&photo.outcome, self.dry_run) {
                (Outcome::Tagged(p), true) => writeln!(
                    f,
                    "{} : would tag ({:.6}, {:.6})",
                    photo.path.display(),
                    p.latitude,
                    p.longitude
                )?,
                _ => writeln!(f, "{}", photo)?,
            }
        }
        write!(
            f,
            "{} {}, {} skipped, {} failed",
            self.tagged,
            if self.dry_run { "would be tagged" } else { "tagged" },
            self.skipped,
            self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaggerOptions {
    /// Work out every outcome without writing to any photo.
    pub dry_run: bool,
}

/// Decides, for each photo, where it was taken and writes that into it.
pub struct PhotoTagger<'a, S> {
    index: &'a TrackIndex,
    alignment: TimeAlignment,
    store: S,
    options: TaggerOptions,
}

impl<'a, S: MetadataStore> PhotoTagger<'a, S> {
    pub fn new(
        index: &'a TrackIndex,
        alignment: TimeAlignment,
        store: S,
        options: TaggerOptions,
    ) -> Self {
        PhotoTagger {
            index,
            alignment,
            store,
            options,
        }
    }

    /// Tag a single photo. Never fails: problems with the photo become `Outcome::Failed`.
    pub fn tag_photo(&self, path: &Path) -> Outcome {
        let record = match self.store.read(path) {
            Ok(record) => record,
            Err(e) => {
                warn!("{}: cannot read metadata: {}", path.display(), e);
                return Outcome::Failed(e.to_string());
            }
        };

        if let Some(existing) = record.position {
            debug!(
                "{}: already at ({}, {})",
                path.display(),
                existing.latitude,
                existing.longitude
            );
            return Outcome::Skipped(SkipReason::AlreadyTagged);
        }

        let capture = match record.capture_time {
            Some(capture) => capture,
            None => {
                debug!("{}: no capture time", path.display());
                return Outcome::Skipped(SkipReason::NoCaptureTime);
            }
        };

        let instant = self.alignment.photo_instant(&capture);
        let position = match self.index.locate(instant) {
            Some(position) => position,
            None => {
                let (first, last) = self.index.window();
                debug!(
                    "{}: taken at {}, outside track {} - {}",
                    path.display(),
                    instant.to_rfc3339(),
                    first.to_rfc3339(),
                    last.to_rfc3339()
                );
                return Outcome::Skipped(SkipReason::OutsideTrack);
            }
        };

        if !self.options.dry_run {
            if let Err(e) = self.store.write(path, &position) {
                warn!("{}: cannot write GPS data: {}", path.display(), e);
                return Outcome::Failed(e.to_string());
            }
        }

        debug!(
            "{}: taken at {}, located at ({}, {})",
            path.display(),
            instant.to_rfc3339(),
            position.latitude,
            position.longitude
        );
        Outcome::Tagged(position)
    }

    /// Tag every JPEG file directly inside `dir`. Only failing to list the folder is an error.
    pub fn tag_folder(&self, dir: &Path) -> Result<BatchReport, TagError> {
        let photos = list_photos(dir)?;
        info!("Found {} photos in {}", photos.len(), dir.display());

        let mut report = BatchReport {
            dry_run: self.options.dry_run,
            ..BatchReport::default()
        };
        for path in photos {
            let outcome = self.tag_photo(&path);
            report.push(path, outcome);
        }

        info!(
            "{} tagged, {} skipped, {} failed",
            report.tagged, report.skipped, report.failed
        );
        Ok(report)
    }
}

/// The `.jpg`/`.jpeg` files (any case) directly inside `dir`, sorted by path.
pub fn list_photos(dir: &Path) -> Result<Vec<PathBuf>, TagError> {
    let folder_error = |source| TagError::Folder {
        path: dir.to_path_buf(),
        source,
    };

    let mut photos = Vec::new();
    for entry in fs::read_dir(dir).map_err(folder_error)? {
        let path = entry.map_err(folder_error)?.path();
        if path.is_file() && is_jpeg(&path) {
            photos.push(path);
        }
    }
    photos.sort();
    Ok(photos)
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg")
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::MetadataError,
        exif::{
            testdata::{self, TiffBuilder},
            TIFFByteAlignment,
        },
        metadata::{JpegExifStore, PhotoRecord},
        time::CaptureTime,
        track::Trackpoint,
    };
    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use std::{cell::RefCell, collections::HashMap};
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 1, h, m, s).unwrap()
    }

    fn local(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn ten_minute_track() -> TrackIndex {
        TrackIndex::new(vec![
            Trackpoint::new(at(10, 0, 0), 10.0, 20.0, None).unwrap(),
            Trackpoint::new(at(10, 10, 0), 10.1, 20.1, None).unwrap(),
        ])
        .unwrap()
    }

    fn assert_tagged_at(outcome: &Outcome, lat: f64, lon: f64) {
        match outcome {
            Outcome::Tagged(p) => {
                assert!((p.latitude - lat).abs() < 1e-6, "{:?}", p);
                assert!((p.longitude - lon).abs() < 1e-6, "{:?}", p);
            }
            other => panic!("expected a tagged outcome, got {:?}", other),
        }
    }

    /// In-memory store that records writes.
    #[derive(Default)]
    struct FakeStore {
        records: HashMap<PathBuf, PhotoRecord>,
        writes: RefCell<Vec<(PathBuf, Position)>>,
    }

    impl FakeStore {
        fn add(&mut self, name: &str, capture: Option<NaiveDateTime>, position: Option<Position>) {
            let path = PathBuf::from(name);
            let record = PhotoRecord {
                path: path.clone(),
                capture_time: capture.map(CaptureTime::new),
                position,
            };
            self.records.insert(path, record);
        }
    }

    impl MetadataStore for &FakeStore {
        fn read(&self, path: &Path) -> Result<PhotoRecord, MetadataError> {
            self.records
                .get(path)
                .cloned()
                .ok_or_else(|| MetadataError::Parse("no such photo".to_string()))
        }

        fn write(&self, path: &Path, position: &Position) -> Result<(), MetadataError> {
            self.writes.borrow_mut().push((path.to_path_buf(), *position));
            Ok(())
        }
    }

    #[test]
    fn test_tag_photo_outcomes() {
        let index = ten_minute_track();
        let mut store = FakeStore::default();
        store.add("inside.jpg", Some(local(10, 5, 0)), None);
        store.add("early.jpg", Some(local(9, 59, 0)), None);
        store.add("tagged.jpg", Some(local(10, 5, 0)), Some(Position::new(1.0, 1.0)));
        store.add("undated.jpg", None, None);

        let tagger =
            PhotoTagger::new(&index, TimeAlignment::default(), &store, TaggerOptions::default());

        assert_tagged_at(&tagger.tag_photo(Path::new("inside.jpg")), 10.05, 20.05);
        assert_eq!(
            tagger.tag_photo(Path::new("early.jpg")),
            Outcome::Skipped(SkipReason::OutsideTrack)
        );
        assert_eq!(
            tagger.tag_photo(Path::new("tagged.jpg")),
            Outcome::Skipped(SkipReason::AlreadyTagged)
        );
        assert_eq!(
            tagger.tag_photo(Path::new("undated.jpg")),
            Outcome::Skipped(SkipReason::NoCaptureTime)
        );
        assert!(matches!(
            tagger.tag_photo(Path::new("missing.jpg")),
            Outcome::Failed(_)
        ));

        let writes = store.writes.borrow();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, PathBuf::from("inside.jpg"));
    }

    #[test]
    fn test_clock_offset_and_zone_are_applied() {
        let index = ten_minute_track();
        let mut store = FakeStore::default();
        // Camera clock 5 minutes slow
        store.add("slow.jpg", Some(local(10, 0, 0)), None);
        // Camera set to UTC+2 and 5 minutes slow
        store.add("abroad.jpg", Some(local(12, 0, 0)), None);

        let alignment = TimeAlignment::new(Duration::minutes(5));
        let tagger = PhotoTagger::new(&index, alignment, &store, TaggerOptions::default());
        assert_tagged_at(&tagger.tag_photo(Path::new("slow.jpg")), 10.05, 20.05);

        let zone = crate::time::parse_zone("+02:00").unwrap();
        let alignment = alignment.with_camera_zone(zone);
        let tagger = PhotoTagger::new(&index, alignment, &store, TaggerOptions::default());
        assert_tagged_at(&tagger.tag_photo(Path::new("abroad.jpg")), 10.05, 20.05);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let index = ten_minute_track();
        let mut store = FakeStore::default();
        store.add("inside.jpg", Some(local(10, 5, 0)), None);

        let options = TaggerOptions { dry_run: true };
        let tagger = PhotoTagger::new(&index, TimeAlignment::default(), &store, options);
        assert_tagged_at(&tagger.tag_photo(Path::new("inside.jpg")), 10.05, 20.05);
        assert!(store.writes.borrow().is_empty());
    }

    fn write_photo(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_tag_folder() {
        let dir = tempdir().unwrap();
        let taken = testdata::photo_taken_at("2023:06:01 10:05:00");
        let inside = write_photo(dir.path(), "a.jpg", &taken);
        write_photo(dir.path(), "b.JPG", &testdata::photo_taken_at("2023:06:01 09:59:00"));
        let tagged_tiff = TiffBuilder::new(TIFFByteAlignment::BigEndian)
            .date_time_original("2023:06:01 10:05:00")
            .gps(1.0, 1.0)
            .build();
        let tagged = write_photo(dir.path(), "c.jpeg", &testdata::jpeg(Some(&tagged_tiff)));
        write_photo(dir.path(), "d.jpg", b"\xff\xd8 this is not really a photo");
        write_photo(dir.path(), "notes.txt", b"not a photo");
        fs::create_dir(dir.path().join("sub")).unwrap();
        write_photo(&dir.path().join("sub"), "e.jpg", &taken);

        let index = ten_minute_track();
        let tagged_before = fs::read(&tagged).unwrap();
        let tagger = PhotoTagger::new(
            &index,
            TimeAlignment::default(),
            JpegExifStore::new(),
            TaggerOptions::default(),
        );
        let report = tagger.tag_folder(dir.path()).unwrap();

        let names: Vec<_> = report
            .photos
            .iter()
            .map(|p| p.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.JPG", "c.jpeg", "d.jpg"]);
        assert_eq!((report.tagged, report.skipped, report.failed), (1, 2, 1));

        assert_tagged_at(&report.photos[0].outcome, 10.05, 20.05);
        assert_eq!(report.photos[1].outcome, Outcome::Skipped(SkipReason::OutsideTrack));
        assert_eq!(report.photos[2].outcome, Outcome::Skipped(SkipReason::AlreadyTagged));
        assert!(matches!(report.photos[3].outcome, Outcome::Failed(_)));

        // The written coordinate reads back, and the tagged photo is untouched
        let record = JpegExifStore::new().read(&inside).unwrap();
        let position = record.position.unwrap();
        assert!((position.latitude - 10.05).abs() < 1e-6);
        assert!((position.longitude - 20.05).abs() < 1e-6);
        assert_eq!(fs::read(&tagged).unwrap(), tagged_before);

        // The file in the subfolder is not touched
        let nested = JpegExifStore::new().read(&dir.path().join("sub").join("e.jpg")).unwrap();
        assert_eq!(nested.position, None);
    }

    #[test]
    fn test_second_run_writes_nothing() {
        let dir = tempdir().unwrap();
        write_photo(dir.path(), "a.jpg", &testdata::photo_taken_at("2023:06:01 10:05:00"));
        write_photo(dir.path(), "b.jpg", &testdata::photo_taken_at("2023:06:01 10:07:30"));

        let index = ten_minute_track();
        let tagger = PhotoTagger::new(
            &index,
            TimeAlignment::default(),
            JpegExifStore::new(),
            TaggerOptions::default(),
        );
        let first = tagger.tag_folder(dir.path()).unwrap();
        assert_eq!(first.tagged, 2);

        let snapshot: Vec<Vec<u8>> = list_photos(dir.path())
            .unwrap()
            .iter()
            .map(|p| fs::read(p).unwrap())
            .collect();

        let second = tagger.tag_folder(dir.path()).unwrap();
        assert_eq!((second.tagged, second.skipped, second.failed), (0, 2, 0));
        for (path, before) in list_photos(dir.path()).unwrap().iter().zip(snapshot) {
            assert_eq!(fs::read(path).unwrap(), before);
        }
    }

    #[test]
    fn test_dry_run_folder() {
        let dir = tempdir().unwrap();
        let data = testdata::photo_taken_at("2023:06:01 10:05:00");
        let path = write_photo(dir.path(), "a.jpg", &data);

        let index = ten_minute_track();
        let options = TaggerOptions { dry_run: true };
        let tagger =
            PhotoTagger::new(&index, TimeAlignment::default(), JpegExifStore::new(), options);
        let report = tagger.tag_folder(dir.path()).unwrap();

        assert!(report.dry_run);
        assert_eq!(report.tagged, 1);
        assert_eq!(fs::read(&path).unwrap(), data);
        assert!(report.to_string().contains("would tag (10.050000, 20.050000)"));
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let dir = tempdir().unwrap();
        let index = ten_minute_track();
        let tagger = PhotoTagger::new(
            &index,
            TimeAlignment::default(),
            JpegExifStore::new(),
            TaggerOptions::default(),
        );
        assert!(matches!(
            tagger.tag_folder(&dir.path().join("nope")),
            Err(TagError::Folder { .. })
        ));
    }

    #[test]
    fn test_report_output() {
        let mut report = BatchReport::default();
        report.push(PathBuf::from("a.jpg"), Outcome::Tagged(Position::new(10.05, 20.05)));
        report.push(PathBuf::from("b.jpg"), Outcome::Skipped(SkipReason::OutsideTrack));
        report.push(PathBuf::from("c.jpg"), Outcome::Failed("not a JPEG file".to_string()));

        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "a.jpg : tagged (10.050000, 20.050000)",
                "b.jpg : skipped: outside track time range",
                "c.jpg : error: not a JPEG file",
                "1 tagged, 1 skipped, 1 failed",
            ]
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tagged"], 1);
        assert_eq!(json["photos"][0]["outcome"]["status"], "tagged");
        assert_eq!(json["photos"][0]["outcome"]["detail"]["latitude"], 10.05);
        assert_eq!(json["photos"][1]["outcome"]["detail"], "outside_track");
        assert_eq!(json["photos"][2]["outcome"]["status"], "failed");
    }
}
