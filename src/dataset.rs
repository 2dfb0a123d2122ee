//! Dataset extraction: locate (downloading if needed) and read the tracks CSV.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::models::SourceTrack;
use crate::progress::create_spinner;

/// Kaggle handle of the tracks dataset.
pub const DEFAULT_DATASET: &str = "maharshipandya/-spotify-tracks-dataset";

const KAGGLE_DOWNLOAD_URL: &str = "https://www.kaggle.com/api/v1/datasets/download";

/// Rows read from the CSV plus the number of rows that failed to parse.
#[derive(Debug, Default)]
pub struct LoadedDataset {
    pub tracks: Vec<SourceTrack>,
    pub skipped: usize,
}

/// Cache directory for a dataset handle (`owner/slug`).
pub fn dataset_cache_dir(handle: &str) -> Result<PathBuf> {
    let (owner, slug) = handle
        .split_once('/')
        .with_context(|| format!("Dataset handle '{}' is not of the form owner/slug", handle))?;
    let base = dirs::cache_dir().context("No user cache directory available")?;
    Ok(base
        .join("track-enrich")
        .join("datasets")
        .join(owner)
        .join(slug))
}

/// First `*.csv` file in `dir`, in directory-listing order sorted by name.
pub fn find_csv(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    Ok(entries.into_iter().find(|p| {
        p.is_file()
            && p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".csv"))
    }))
}

/// Return a path to the dataset CSV, downloading and unpacking it on first use.
pub fn ensure_dataset(handle: &str) -> Result<PathBuf> {
    let dir = dataset_cache_dir(handle)?;
    if let Some(csv) = find_csv(&dir)? {
        info!("Using cached dataset: {}", csv.display());
        return Ok(csv);
    }

    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let archive = dir.join("archive.zip");
    download_archive(handle, &archive)?;
    extract_archive(&archive, &dir)?;
    if let Err(e) = fs::remove_file(&archive) {
        warn!("Could not remove {}: {}", archive.display(), e);
    }

    match find_csv(&dir)? {
        Some(csv) => Ok(csv),
        None => bail!("Dataset '{}' contains no CSV file", handle),
    }
}

fn download_archive(handle: &str, dest: &Path) -> Result<()> {
    let url = format!("{}/{}", KAGGLE_DOWNLOAD_URL, handle);
    let spinner = create_spinner(&format!("Downloading {}", handle));

    let mut request = ureq::get(&url);
    if let (Ok(user), Ok(key)) = (std::env::var("KAGGLE_USERNAME"), std::env::var("KAGGLE_KEY")) {
        use base64::Engine;
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, key));
        request = request.set("Authorization", &format!("Basic {}", token));
    }

    let response = request
        .call()
        .with_context(|| format!("Failed to download dataset from {}", url))?;
    let mut reader = response.into_reader();
    let mut file =
        File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
    let bytes = io::copy(&mut reader, &mut file).context("Failed to write dataset archive")?;

    spinner.finish_with_message(format!("Downloaded {} ({:.1} MB)", handle, bytes as f64 / 1_048_576.0));
    Ok(())
}

/// Unpack every regular file of a zip archive into `dest`, flattening paths.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file).context("Dataset archive is not a valid zip")?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_owned()))
        else {
            warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let out_path = dest.join(name);
        let mut out = File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

/// Read the tracks CSV. Rows that do not deserialize are skipped and counted.
pub fn read_tracks(path: &Path) -> Result<LoadedDataset> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV {}", path.display()))?;

    let mut loaded = LoadedDataset::default();
    for (line, row) in reader.deserialize::<SourceTrack>().enumerate() {
        match row {
            Ok(track) => loaded.tracks.push(track),
            Err(e) => {
                if loaded.skipped < 10 {
                    warn!("Skipping CSV row {}: {}", line + 2, e);
                }
                loaded.skipped += 1;
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_find_csv_picks_csv() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), "x").unwrap();
        fs::write(dir.path().join("dataset.csv"), "track_id\n").unwrap();
        let found = find_csv(dir.path()).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "dataset.csv");
    }

    #[test]
    fn test_find_csv_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(find_csv(&dir.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn test_dataset_cache_dir_rejects_bad_handle() {
        assert!(dataset_cache_dir("no-slash").is_err());
    }

    #[test]
    fn test_read_tracks_skips_bad_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        fs::write(
            &path,
            "track_id,track_name,popularity\n\
             a,One,40\n\
             b,Two,not-a-number\n\
             c,Three,\n",
        )
        .unwrap();

        let loaded = read_tracks(&path).unwrap();
        assert_eq!(loaded.tracks.len(), 2);
        assert_eq!(loaded.skipped, 1);
        assert_eq!(loaded.tracks[0].track_id, "a");
        assert_eq!(loaded.tracks[1].popularity, None);
    }

    #[test]
    fn test_extract_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("archive.zip");
        {
            let file = File::create(&archive).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("nested/dataset.csv", options).unwrap();
            zip.write_all(b"track_id\nabc\n").unwrap();
            zip.finish().unwrap();
        }

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        extract_archive(&archive, &out).unwrap();

        let csv = find_csv(&out).unwrap().unwrap();
        assert_eq!(fs::read_to_string(csv).unwrap(), "track_id\nabc\n");
    }
}
