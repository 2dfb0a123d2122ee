//! Reading and writing the enriched dataset file.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::models::EnrichedTrack;

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "dataset_final.json";

/// Write records as a JSON array, pretty-printed with a four-space indent.
pub fn write_dataset(path: &Path, tracks: &[EnrichedTrack]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    tracks
        .serialize(&mut ser)
        .context("Failed to serialize dataset")?;

    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Load an enriched dataset written by [`write_dataset`].
pub fn read_dataset(path: &Path) -> Result<Vec<EnrichedTrack>> {
    let file = File::open(path)
        .with_context(|| format!("Unable to read dataset {}", path.display()))?;
    let tracks: Vec<EnrichedTrack> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a valid enriched dataset", path.display()))?;
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use tempfile::tempdir;

    fn sample() -> EnrichedTrack {
        EnrichedTrack {
            track_name: Some("Despacito".to_string()),
            artists: Some("Luis Fonsi;Daddy Yankee".to_string()),
            year: "2017".to_string(),
            region: Some(Region::LatinAmerica),
            country_code: "PR".to_string(),
            image: Some("https://i.scdn.co/image/x".to_string()),
            preview: None,
            duration_fmt: "3:48".to_string(),
            popularity: 79,
            danceability: Some(0.655),
            energy: Some(0.797),
            tempo: Some(177.928),
            track_genre: Some("latin".to_string()),
        }
    }

    #[test]
    fn test_written_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset_final.json");
        write_dataset(&path, &[sample()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n    {\n        \"track_name\": \"Despacito\","));
        assert!(text.contains("\"region\": \"Amérique Latine/ Amérique du Sud\""));
        assert!(text.contains("\"preview\": null"));

        // Columns keep their output order
        let name_at = text.find("\"track_name\"").unwrap();
        let year_at = text.find("\"year\"").unwrap();
        let genre_at = text.find("\"track_genre\"").unwrap();
        assert!(name_at < year_at && year_at < genre_at);
    }

    #[test]
    fn test_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset_final.json");
        write_dataset(&path, &[sample()]).unwrap();
        let back = read_dataset(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].track_name, sample().track_name);
        assert_eq!(back[0].region, Some(Region::LatinAmerica));
        assert_eq!(back[0].year_num(), Some(2017));
        assert!((back[0].tempo.unwrap() - 177.928).abs() < 1e-9);
    }

    #[test]
    fn test_read_null_and_missing_region() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset_final.json");
        let mut without = serde_json::to_value(sample()).unwrap();
        without.as_object_mut().unwrap().remove("region");
        let mut null = serde_json::to_value(sample()).unwrap();
        null["region"] = serde_json::Value::Null;
        std::fs::write(&path, serde_json::to_string(&vec![without, null]).unwrap()).unwrap();

        let back = read_dataset(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.iter().all(|t| t.region.is_none()));
        assert_eq!(back[1].track_name, sample().track_name);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_dataset(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Unable to read dataset"));
    }
}
