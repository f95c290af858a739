use anyhow::{Context, Result};
use clap::Parser;
use gpxtag::{
    time::{parse_clock_offset, parse_zone},
    track::gpx,
    version, JpegExifStore, PhotoTagger, TaggerOptions, TimeAlignment,
};
use std::{io, path::PathBuf};
use tracing_subscriber::EnvFilter;

/// Geotag the JPEG photos in a folder from a GPX track log
#[derive(Parser, Debug)]
#[command(name = version::name(), version = version::version())]
struct Cli {
    /// Folder holding the photos (subfolders are not searched)
    photos: PathBuf,

    /// GPX track log recorded while the photos were taken
    track: PathBuf,

    /// Correction added to every photo's clock: minutes, H:MM[:SS] or e.g. 1h30m
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<String>,

    /// Time zone the camera clock was set to, e.g. +02:00 (default: the photo's own, else UTC)
    #[arg(long, allow_hyphen_values = true)]
    camera_zone: Option<String>,

    /// Read the track's times as wall-clock times in this zone
    #[arg(long, allow_hyphen_values = true)]
    track_zone: Option<String>,

    /// Report what would be tagged without changing any photo
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log every decision
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn alignment(&self) -> Result<TimeAlignment> {
        let mut alignment = match &self.offset {
            Some(offset) => TimeAlignment::new(parse_clock_offset(offset).context("--offset")?),
            None => TimeAlignment::default(),
        };
        if let Some(zone) = &self.camera_zone {
            alignment = alignment.with_camera_zone(parse_zone(zone).context("--camera-zone")?);
        }
        if let Some(zone) = &self.track_zone {
            alignment = alignment.with_track_zone(parse_zone(zone).context("--track-zone")?);
        }
        Ok(alignment)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let alignment = cli.alignment()?;
    let track = gpx::load(&cli.track, &alignment)
        .with_context(|| format!("loading track from {}", cli.track.display()))?;

    let options = TaggerOptions {
        dry_run: cli.dry_run,
    };
    let tagger = PhotoTagger::new(&track.index, alignment, JpegExifStore::new(), options);
    let report = tagger
        .tag_folder(&cli.photos)
        .with_context(|| format!("tagging photos in {}", cli.photos.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn alignment_error(args: &[&str]) -> String {
        let mut argv = vec!["gpxtag", "photos", "track.gpx"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        format!("{:#}", cli.alignment().unwrap_err())
    }

    #[test]
    fn test_bad_flags_are_named() {
        assert!(alignment_error(&["--offset", "soon"]).starts_with("--offset: "));
        assert!(alignment_error(&["--camera-zone", "Mars"]).starts_with("--camera-zone: "));
        assert!(alignment_error(&["--track-zone", "+99:00"]).starts_with("--track-zone: "));
    }
}
