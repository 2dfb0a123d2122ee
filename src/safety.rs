//! Safety checks on the output path.
//!
//! The pipeline overwrites its output file; these checks make sure that file
//! can never be the source dataset.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output must carry the required extension (e.g. "json")
/// - Output cannot be the same as any of the provided source paths
pub fn validate_output_path(
    output: &Path,
    required_extension: &str,
    source_paths: &[&Path],
) -> Result<()> {
    let extension = output.extension().and_then(|e| e.to_str()).unwrap_or("");

    if !extension.eq_ignore_ascii_case(required_extension) {
        bail!(
            "Safety check failed: output file '{}' must have a .{} extension",
            output.display(),
            required_extension
        );
    }

    for source in source_paths {
        let same = output == *source
            || matches!(
                (output.canonicalize(), source.canonicalize()),
                (Ok(a), Ok(b)) if a == b
            );
        if same {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_output() {
        let output = PathBuf::from("/tmp/dataset_final.json");
        let source = PathBuf::from("/data/dataset.csv");
        assert!(validate_output_path(&output, "json", &[&source]).is_ok());
    }

    #[test]
    fn test_wrong_extension() {
        let output = PathBuf::from("/tmp/dataset.csv");
        let source = PathBuf::from("/data/other.csv");
        let result = validate_output_path(&output, "json", &[&source]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must have a .json extension"));
    }

    #[test]
    fn test_output_equals_source() {
        let path = PathBuf::from("/data/dataset.json");
        let result = validate_output_path(&path, "json", &[&path]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as source"));
    }

    #[test]
    fn test_output_equals_source_via_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("tracks.json");
        std::fs::write(&source, "[]").unwrap();
        let aliased = dir.path().join(".").join("tracks.json");
        assert!(validate_output_path(&aliased, "json", &[&source]).is_err());
    }
}
