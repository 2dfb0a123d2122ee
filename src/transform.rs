//! Selection, batched enrichment, and the merge into output records.

use rustc_hash::FxHashSet;
use std::thread;
use std::time::Duration;

use crate::models::{EnrichStats, EnrichedTrack, MetadataMap, SourceTrack};
use crate::progress::{create_progress_bar, log_progress};
use crate::spotify::{BatchOutcome, MetadataSource};

// ============================================================================
// Pipeline Constants
// ============================================================================

/// Tracks below this popularity are not worth a lookup.
pub const MIN_POPULARITY: u32 = 30;

/// Ids per `/v1/tracks` request (the API maximum).
pub const BATCH_SIZE: usize = 50;

/// Pause after every batch request.
pub const REQUEST_PAUSE: Duration = Duration::from_millis(500);

/// Progress is reported every this many batches.
const PROGRESS_INTERVAL: u64 = 10;

// ============================================================================
// Selection
// ============================================================================

/// Keep tracks with `popularity >= min_popularity`, dropping repeated track
/// ids (first occurrence wins, source order preserved).
pub fn select_hits(
    tracks: Vec<SourceTrack>,
    min_popularity: u32,
    stats: &mut EnrichStats,
) -> Vec<SourceTrack> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut hits = Vec::new();

    for track in tracks {
        if !track.popularity.is_some_and(|p| p >= min_popularity) {
            continue;
        }
        if seen.insert(track.track_id.clone()) {
            hits.push(track);
        } else {
            stats.duplicates_removed += 1;
        }
    }

    stats.hits_selected = hits.len();
    hits
}

// ============================================================================
// Fetch
// ============================================================================

/// Options for the batch loop.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub batch_size: usize,
    pub pause: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            pause: REQUEST_PAUSE,
        }
    }
}

/// Number of batches needed for `n` ids.
pub fn batch_count(n: usize, batch_size: usize) -> usize {
    n.div_ceil(batch_size.max(1))
}

/// Look up every id in fixed-size batches, one request at a time, pausing
/// after each. Batches that fail contribute nothing.
pub fn fetch_all<S: MetadataSource>(
    source: &mut S,
    track_ids: &[String],
    options: &FetchOptions,
    stats: &mut EnrichStats,
) -> MetadataMap {
    let batch_size = options.batch_size.max(1);
    let total = batch_count(track_ids.len(), batch_size);
    let pb = create_progress_bar(total as u64, "Fetching metadata");

    let mut metadata = MetadataMap::default();
    for (i, batch) in track_ids.chunks(batch_size).enumerate() {
        let (results, outcome) = source.fetch_batch(batch);
        match outcome {
            BatchOutcome::Ok => {}
            BatchOutcome::RateLimited => stats.batches_rate_limited += 1,
            BatchOutcome::Failed => stats.batches_failed += 1,
        }
        metadata.extend(results);
        stats.batches += 1;

        pb.inc(1);
        log_progress("batches", i as u64 + 1, total as u64, PROGRESS_INTERVAL);

        if !options.pause.is_zero() {
            thread::sleep(options.pause);
        }
    }

    pb.finish_with_message(format!("Fetched metadata for {} tracks", metadata.len()));
    stats.tracks_with_metadata = metadata.len();
    metadata
}

// ============================================================================
// Merge
// ============================================================================

/// Render milliseconds as `M:SS`. Hours wrap, as minutes are taken mod 60;
/// the modulo is Euclidean, so both fields stay in `0..60`.
pub fn format_duration(ms: Option<f64>) -> String {
    let Some(ms) = ms.filter(|v| v.is_finite()) else {
        return "0:00".to_string();
    };
    let seconds = (ms / 1000.0).rem_euclid(60.0) as i64;
    let minutes = (ms / 60_000.0).rem_euclid(60.0) as i64;
    format!("{}:{:02}", minutes, seconds)
}

/// Join selected tracks with fetched metadata. Tracks with no metadata, or
/// whose metadata carries no release year, are dropped.
pub fn merge(
    hits: Vec<SourceTrack>,
    metadata: &MetadataMap,
    stats: &mut EnrichStats,
) -> Vec<EnrichedTrack> {
    let mut out = Vec::with_capacity(hits.len());

    for track in hits {
        let Some(meta) = metadata.get(&track.track_id) else {
            stats.rows_dropped += 1;
            continue;
        };
        let Some(year) = meta.year.clone() else {
            stats.rows_dropped += 1;
            continue;
        };

        out.push(EnrichedTrack {
            track_name: track.track_name,
            artists: track.artists,
            year,
            region: Some(meta.region),
            country_code: meta.country.clone(),
            image: meta.image.clone(),
            preview: meta.preview.clone(),
            duration_fmt: format_duration(track.duration_ms),
            popularity: track.popularity.unwrap_or_default(),
            danceability: track.danceability,
            energy: track.energy,
            tempo: track.tempo,
            track_genre: track.track_genre,
        });
    }

    stats.rows_written = out.len();
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackMetadata;
    use crate::region::Region;

    fn source(id: &str, popularity: Option<u32>) -> SourceTrack {
        SourceTrack {
            track_id: id.to_string(),
            track_name: Some(format!("Song {}", id)),
            artists: Some("Artist".to_string()),
            popularity,
            duration_ms: Some(230_666.0),
            track_genre: Some("pop".to_string()),
            ..Default::default()
        }
    }

    fn meta(year: Option<&str>, country: &str, region: Region) -> TrackMetadata {
        TrackMetadata {
            year: year.map(str::to_string),
            image: Some("img".to_string()),
            preview: None,
            country: country.to_string(),
            region,
        }
    }

    /// Answers from a fixed table and records every batch it was asked for.
    struct FakeSource {
        known: MetadataMap,
        calls: Vec<Vec<String>>,
        fail_batches: Vec<usize>,
    }

    impl FakeSource {
        fn new(known: MetadataMap) -> Self {
            Self {
                known,
                calls: Vec::new(),
                fail_batches: Vec::new(),
            }
        }
    }

    impl MetadataSource for FakeSource {
        fn fetch_batch(&mut self, track_ids: &[String]) -> (MetadataMap, BatchOutcome) {
            let index = self.calls.len();
            self.calls.push(track_ids.to_vec());
            if self.fail_batches.contains(&index) {
                return (MetadataMap::default(), BatchOutcome::RateLimited);
            }
            let map = track_ids
                .iter()
                .filter_map(|id| self.known.get(id).map(|m| (id.clone(), m.clone())))
                .collect();
            (map, BatchOutcome::Ok)
        }
    }

    fn no_pause(batch_size: usize) -> FetchOptions {
        FetchOptions {
            batch_size,
            pause: Duration::ZERO,
        }
    }

    #[test]
    fn test_select_hits_threshold_and_dedup() {
        let mut stats = EnrichStats::default();
        let tracks = vec![
            source("a", Some(30)),
            source("b", Some(29)),
            source("a", Some(80)),
            source("c", None),
            source("d", Some(100)),
        ];
        let hits = select_hits(tracks, MIN_POPULARITY, &mut stats);
        let ids: Vec<&str> = hits.iter().map(|t| t.track_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(hits[0].popularity, Some(30));
        assert_eq!(stats.hits_selected, 2);
        assert_eq!(stats.duplicates_removed, 1);
    }

    #[test]
    fn test_batch_count() {
        assert_eq!(batch_count(0, 50), 0);
        assert_eq!(batch_count(50, 50), 1);
        assert_eq!(batch_count(51, 50), 2);
        assert_eq!(batch_count(120, 50), 3);
    }

    #[test]
    fn test_fetch_all_batches_in_order() {
        let ids: Vec<String> = (0..7).map(|i| format!("t{}", i)).collect();
        let mut known = MetadataMap::default();
        known.insert("t1".to_string(), meta(Some("2001"), "US", Region::NorthAmerica));
        known.insert("t6".to_string(), meta(Some("2010"), "FR", Region::Europe));

        let mut fake = FakeSource::new(known);
        let mut stats = EnrichStats::default();
        let map = fetch_all(&mut fake, &ids, &no_pause(3), &mut stats);

        assert_eq!(fake.calls.len(), 3);
        assert_eq!(fake.calls[0], vec!["t0", "t1", "t2"]);
        assert_eq!(fake.calls[2], vec!["t6"]);
        assert_eq!(map.len(), 2);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.tracks_with_metadata, 2);
    }

    #[test]
    fn test_fetch_all_rate_limited_batch_is_skipped() {
        let ids: Vec<String> = (0..4).map(|i| format!("t{}", i)).collect();
        let mut known = MetadataMap::default();
        for id in &ids {
            known.insert(id.clone(), meta(Some("1999"), "GB", Region::Europe));
        }

        let mut fake = FakeSource::new(known);
        fake.fail_batches = vec![0];
        let mut stats = EnrichStats::default();
        let map = fetch_all(&mut fake, &ids, &no_pause(2), &mut stats);

        assert_eq!(fake.calls.len(), 2);
        assert!(!map.contains_key("t0"));
        assert!(map.contains_key("t3"));
        assert_eq!(stats.batches_rate_limited, 1);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Some(230_666.0)), "3:50");
        assert_eq!(format_duration(Some(61_000.0)), "1:01");
        assert_eq!(format_duration(Some(999.0)), "0:00");
        assert_eq!(format_duration(None), "0:00");
        assert_eq!(format_duration(Some(f64::NAN)), "0:00");
        // 1h 2m 3s: hours wrap away
        assert_eq!(format_duration(Some(3_723_000.0)), "2:03");
    }

    #[test]
    fn test_format_duration_negative() {
        assert_eq!(format_duration(Some(-1000.0)), "59:59");
        assert_eq!(format_duration(Some(-61_000.0)), "58:59");
        assert!(!format_duration(Some(-1.0)).contains('-'));
    }

    #[test]
    fn test_merge_drops_missing_and_yearless() {
        let hits = vec![
            source("a", Some(70)),
            source("b", Some(60)),
            source("c", Some(50)),
        ];
        let mut metadata = MetadataMap::default();
        metadata.insert("a".to_string(), meta(Some("2012"), "US", Region::NorthAmerica));
        metadata.insert("b".to_string(), meta(None, "XX", Region::Unknown));

        let mut stats = EnrichStats::default();
        let out = merge(hits, &metadata, &mut stats);

        assert_eq!(out.len(), 1);
        let a = &out[0];
        assert_eq!(a.track_name.as_deref(), Some("Song a"));
        assert_eq!(a.year, "2012");
        assert_eq!(a.region, Some(Region::NorthAmerica));
        assert_eq!(a.country_code, "US");
        assert_eq!(a.duration_fmt, "3:50");
        assert_eq!(a.popularity, 70);
        assert_eq!(stats.rows_written, 1);
        assert_eq!(stats.rows_dropped, 2);
    }
}
