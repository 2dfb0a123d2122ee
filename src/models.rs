//! Core data models for the enrichment pipeline.
//!
//! Source rows from the CSV dataset, metadata fetched from the Spotify Web
//! API, the enriched output record, and run statistics.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::region::Region;

// ============================================================================
// Type Aliases
// ============================================================================

/// Track id -> metadata fetched for it.
pub type MetadataMap = FxHashMap<String, TrackMetadata>;

// ============================================================================
// Source Models
// ============================================================================

/// One row of the tracks CSV. Unknown columns are ignored; every column
/// other than the id may be blank.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceTrack {
    pub track_id: String,
    pub artists: Option<String>,
    pub album_name: Option<String>,
    pub track_name: Option<String>,
    pub popularity: Option<u32>,
    pub duration_ms: Option<f64>,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub tempo: Option<f64>,
    pub track_genre: Option<String>,
}

// ============================================================================
// Spotify Models
// ============================================================================

/// Metadata kept per track after an API lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackMetadata {
    pub year: Option<String>,
    pub image: Option<String>,
    pub preview: Option<String>,
    pub country: String,
    pub region: Region,
}

/// Reply of `GET /v1/tracks?ids=...`. Unknown ids come back as `null`.
#[derive(Debug, Default, Deserialize)]
pub struct TracksResponse {
    #[serde(default)]
    pub tracks: Vec<Option<ApiTrack>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiTrack {
    pub id: String,
    pub album: Option<ApiAlbum>,
    pub preview_url: Option<String>,
    pub external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
pub struct ApiAlbum {
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiImage {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ExternalIds {
    pub isrc: Option<String>,
}

/// Reply of the client-credentials token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
}

// ============================================================================
// Output Models
// ============================================================================

/// Final enriched record. Field order is the column order of the output file.
///
/// `year` stays the four-character prefix of the album release date; readers
/// that need a number go through [`EnrichedTrack::year_num`]. Files edited by
/// hand may carry a `null` or missing `region`; those read back as `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTrack {
    pub track_name: Option<String>,
    pub artists: Option<String>,
    pub year: String,
    #[serde(default)]
    pub region: Option<Region>,
    pub country_code: String,
    pub image: Option<String>,
    pub preview: Option<String>,
    pub duration_fmt: String,
    pub popularity: u32,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub tempo: Option<f64>,
    pub track_genre: Option<String>,
}

impl EnrichedTrack {
    pub fn year_num(&self) -> Option<i32> {
        self.year.trim().parse().ok()
    }

    /// Duration in seconds parsed back from `M:SS`. `None` when malformed or
    /// too large for a `u32`.
    pub fn duration_secs(&self) -> Option<u32> {
        let (m, s) = self.duration_fmt.split_once(':')?;
        let m: u32 = m.trim().parse().ok()?;
        let s: u32 = s.trim().parse().ok()?;
        m.checked_mul(60)?.checked_add(s)
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-run counters, logged at the end and optionally written with `--stats`.
#[derive(Default, Debug, Clone, Serialize)]
pub struct EnrichStats {
    // Extract
    pub rows_read: usize,
    pub rows_skipped: usize,

    // Selection
    pub hits_selected: usize,
    pub duplicates_removed: usize,

    // Fetch
    pub batches: usize,
    pub batches_rate_limited: usize,
    pub batches_failed: usize,
    pub tracks_with_metadata: usize,

    // Merge
    pub rows_written: usize,
    pub rows_dropped: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl EnrichStats {
    /// Share of selected tracks that made it into the output, in percent.
    pub fn enrich_rate(&self) -> f64 {
        if self.hits_selected == 0 {
            0.0
        } else {
            100.0 * self.rows_written as f64 / self.hits_selected as f64
        }
    }

    pub fn log_summary(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => log::info!("run statistics:\n{}", json),
            Err(e) => log::warn!("could not serialize statistics: {}", e),
        }
    }

    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
