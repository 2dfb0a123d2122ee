//! Descriptive filters and aggregations over the enriched dataset.
//!
//! Everything here is a pure function of the loaded records; the binaries
//! only parse arguments and print.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::cmp::Ordering;

use crate::models::EnrichedTrack;
use crate::region::Region;

// ============================================================================
// Thresholds
// ============================================================================

/// A track strictly above this popularity counts as a hit.
pub const HIT_THRESHOLD: u32 = 75;

/// Genres with this many tracks or fewer are left out of genre statistics.
pub const MIN_GENRE_COUNT: usize = 10;

pub const TOP_LIMIT: usize = 50;

/// How many tracks the region report falls back to when nothing is a hit.
pub const FALLBACK_TOP: usize = 10;

/// Geography bucket for records without a region.
pub const MISSING_REGION_LABEL: &str = "Autre";

/// Geography bucket for records without a genre.
pub const MISSING_GENRE_LABEL: &str = "Autres";

/// Separators between credited artists in the `artists` column.
static ARTIST_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",|;| feat\. | & ").unwrap());

// ============================================================================
// Filters
// ============================================================================

/// Inclusive range of release years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearWindow {
    pub from: i32,
    pub to: i32,
}

impl YearWindow {
    pub const fn new(from: i32, to: i32) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.from..=self.to).contains(&year)
    }
}

impl Default for YearWindow {
    fn default() -> Self {
        Self::new(1980, 2022)
    }
}

/// Region/year selection shared by the genre and top views. Without a year,
/// tracks must fall inside `window`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackFilter {
    pub region: Option<Region>,
    pub year: Option<i32>,
    pub window: YearWindow,
}

impl TrackFilter {
    pub fn matches(&self, track: &EnrichedTrack) -> bool {
        if self.region.is_some_and(|r| track.region != Some(r)) {
            return false;
        }
        match (track.year_num(), self.year) {
            (Some(y), Some(wanted)) => y == wanted,
            (Some(y), None) => self.window.contains(y),
            (None, _) => false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn by_popularity_desc(a: &&EnrichedTrack, b: &&EnrichedTrack) -> Ordering {
    b.popularity.cmp(&a.popularity)
}

// ============================================================================
// Region Report
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TrackLine {
    pub track_name: Option<String>,
    pub artists: Option<String>,
    pub year: String,
    pub popularity: u32,
}

impl From<&EnrichedTrack> for TrackLine {
    fn from(t: &EnrichedTrack) -> Self {
        Self {
            track_name: t.track_name.clone(),
            artists: t.artists.clone(),
            year: t.year.clone(),
            popularity: t.popularity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionReport {
    pub region: Region,
    pub window: YearWindow,
    pub threshold: u32,
    pub total: usize,
    pub max_popularity: Option<u32>,
    pub avg_popularity: Option<f64>,
    /// Tracks above the threshold, most popular first.
    pub hits: Vec<TrackLine>,
    /// Filled only when `hits` is empty: the subset's most popular tracks.
    pub fallback_top: Vec<TrackLine>,
    /// Distinct regions of the whole dataset, in order of first appearance.
    /// Records without a region are not listed.
    pub regions_present: Vec<Region>,
}

/// Restrict to one region and year window and summarize its popularity.
pub fn region_report(
    tracks: &[EnrichedTrack],
    region: Region,
    window: YearWindow,
    threshold: u32,
) -> RegionReport {
    let mut subset: Vec<&EnrichedTrack> = tracks
        .iter()
        .filter(|t| t.region == Some(region) && t.year_num().is_some_and(|y| window.contains(y)))
        .collect();

    let mut popularity = Mean::default();
    for t in &subset {
        popularity.add(t.popularity as f64);
    }
    let max_popularity = subset.iter().map(|t| t.popularity).max();

    subset.sort_by(by_popularity_desc);
    let hits: Vec<TrackLine> = subset
        .iter()
        .filter(|t| t.popularity > threshold)
        .map(|t| TrackLine::from(*t))
        .collect();
    let fallback_top = if hits.is_empty() {
        subset.iter().take(FALLBACK_TOP).map(|t| TrackLine::from(*t)).collect()
    } else {
        Vec::new()
    };

    let mut regions_present = Vec::new();
    for r in tracks.iter().filter_map(|t| t.region) {
        if !regions_present.contains(&r) {
            regions_present.push(r);
        }
    }

    RegionReport {
        region,
        window,
        threshold,
        total: subset.len(),
        max_popularity,
        avg_popularity: popularity.value(),
        hits,
        fallback_top,
        regions_present,
    }
}

// ============================================================================
// KPIs
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Kpis {
    pub total_songs: usize,
    pub distinct_artists: usize,
    pub top_region: Option<Region>,
    /// Mean duration as `M:SS`, over all records.
    pub avg_duration: Option<String>,
}

/// Split an `artists` cell into individual, trimmed names.
pub fn split_artists(artists: &str) -> impl Iterator<Item = &str> {
    ARTIST_SEPARATOR
        .split(artists)
        .map(str::trim)
        .filter(|a| !a.is_empty())
}

/// Render seconds as `M:SS` (rounded seconds).
pub fn format_secs(secs: f64) -> String {
    let minutes = (secs / 60.0).floor() as i64;
    let seconds = (secs % 60.0).round() as i64;
    format!("{}:{:02}", minutes, seconds)
}

pub fn kpis(tracks: &[EnrichedTrack]) -> Kpis {
    let mut artists: FxHashSet<&str> = FxHashSet::default();
    for t in tracks {
        if let Some(a) = t.artists.as_deref() {
            artists.extend(split_artists(a));
        }
    }

    // Ties go to the region seen last.
    let counts = count_ordered(tracks.iter().filter_map(|t| t.region));
    let top_region = counts
        .iter()
        .fold(None::<(Region, usize)>, |best, &(r, c)| match best {
            Some((_, bc)) if bc > c => best,
            _ => Some((r, c)),
        })
        .map(|(r, _)| r);

    let total_secs: u64 = tracks
        .iter()
        .filter_map(|t| t.duration_secs())
        .map(u64::from)
        .sum();
    let avg_duration =
        (!tracks.is_empty()).then(|| format_secs(total_secs as f64 / tracks.len() as f64));

    Kpis {
        total_songs: tracks.len(),
        distinct_artists: artists.len(),
        top_region,
        avg_duration,
    }
}

/// Count occurrences, keeping keys in order of first appearance.
fn count_ordered<K: Eq + std::hash::Hash + Copy>(keys: impl Iterator<Item = K>) -> Vec<(K, usize)> {
    let mut index: FxHashMap<K, usize> = FxHashMap::default();
    let mut counts: Vec<(K, usize)> = Vec::new();
    for k in keys {
        match index.get(&k) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(k, counts.len());
                counts.push((k, 1));
            }
        }
    }
    counts
}

// ============================================================================
// Geography
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct GenreScore {
    pub genre: String,
    pub avg_popularity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionStats {
    /// `None` for records without a region.
    pub region: Option<Region>,
    pub count: usize,
    pub avg_popularity: f64,
    /// Best three genres by mean popularity; only for the five largest regions.
    pub top_genres: Vec<GenreScore>,
}

impl RegionStats {
    pub fn label(&self) -> &'static str {
        self.region.map_or(MISSING_REGION_LABEL, |r| r.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Geography {
    /// Largest region first.
    pub regions: Vec<RegionStats>,
    /// Country codes, most frequent first.
    pub countries: Vec<(String, usize)>,
}

/// Per-region and per-country breakdown. Tracks of `Unknown` region are left
/// out; tracks without a region form their own bucket, as do tracks without a
/// genre within a region.
pub fn geography(tracks: &[EnrichedTrack]) -> Geography {
    let kept = tracks
        .iter()
        .filter(|t| t.region.map_or(true, |r| r.is_known()));

    let mut countries: FxHashMap<&str, usize> = FxHashMap::default();
    let mut popularity: FxHashMap<Option<Region>, Mean> = FxHashMap::default();
    let mut genres: FxHashMap<Option<Region>, FxHashMap<&str, Mean>> = FxHashMap::default();

    for t in kept {
        *countries.entry(t.country_code.as_str()).or_default() += 1;
        popularity.entry(t.region).or_default().add(t.popularity as f64);
        let genre = t
            .track_genre
            .as_deref()
            .filter(|g| !g.is_empty())
            .unwrap_or(MISSING_GENRE_LABEL);
        genres
            .entry(t.region)
            .or_default()
            .entry(genre)
            .or_default()
            .add(t.popularity as f64);
    }

    let mut regions: Vec<RegionStats> = popularity
        .into_iter()
        .map(|(region, mean)| RegionStats {
            region,
            count: mean.count,
            avg_popularity: mean.value().unwrap_or_default(),
            top_genres: Vec::new(),
        })
        .collect();
    regions.sort_by(|a, b| b.count.cmp(&a.count).then(a.region.cmp(&b.region)));

    for stats in regions.iter_mut().take(5) {
        if let Some(per_genre) = genres.get(&stats.region) {
            stats.top_genres = ranked_genres(per_genre, 3);
        }
    }

    let mut countries: Vec<(String, usize)> = countries
        .into_iter()
        .map(|(c, n)| (c.to_string(), n))
        .collect();
    countries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Geography { regions, countries }
}

/// Genres by mean popularity, best first, ties broken by name.
fn ranked_genres(per_genre: &FxHashMap<&str, Mean>, limit: usize) -> Vec<GenreScore> {
    let mut scores: Vec<GenreScore> = per_genre
        .iter()
        .filter_map(|(g, m)| {
            m.value().map(|avg| GenreScore {
                genre: g.to_string(),
                avg_popularity: avg,
            })
        })
        .collect();
    scores.sort_by(|a, b| {
        b.avg_popularity
            .total_cmp(&a.avg_popularity)
            .then_with(|| a.genre.cmp(&b.genre))
    });
    scores.truncate(limit);
    scores
}

// ============================================================================
// Genres
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct GenreStats {
    pub genre: String,
    pub count: usize,
    pub hits: usize,
    pub avg_popularity: f64,
    pub avg_danceability: f64,
    pub avg_energy: f64,
}

#[derive(Default)]
struct GenreAcc {
    count: usize,
    hits: usize,
    popularity: f64,
    danceability: f64,
    energy: f64,
}

/// Per-genre statistics of the filtered tracks, most common genre first.
/// Missing danceability/energy count as zero.
pub fn genre_stats(tracks: &[EnrichedTrack], filter: &TrackFilter) -> Vec<GenreStats> {
    let mut acc: FxHashMap<&str, GenreAcc> = FxHashMap::default();
    for t in tracks.iter().filter(|t| filter.matches(t)) {
        let Some(genre) = t.track_genre.as_deref().filter(|g| !g.is_empty()) else {
            continue;
        };
        let a = acc.entry(genre).or_default();
        a.count += 1;
        a.popularity += t.popularity as f64;
        a.danceability += t.danceability.unwrap_or_default();
        a.energy += t.energy.unwrap_or_default();
        if t.popularity > HIT_THRESHOLD {
            a.hits += 1;
        }
    }

    let mut stats: Vec<GenreStats> = acc
        .into_iter()
        .filter(|(_, a)| a.count > MIN_GENRE_COUNT)
        .map(|(genre, a)| {
            let n = a.count as f64;
            GenreStats {
                genre: genre.to_string(),
                count: a.count,
                hits: a.hits,
                avg_popularity: a.popularity / n,
                avg_danceability: a.danceability / n,
                avg_energy: a.energy / n,
            }
        })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.genre.cmp(&b.genre)));
    stats
}

// ============================================================================
// Top Tracks
// ============================================================================

/// The `limit` most popular tracks passing the filter.
pub fn top_tracks<'a>(
    tracks: &'a [EnrichedTrack],
    filter: &TrackFilter,
    limit: usize,
) -> Vec<&'a EnrichedTrack> {
    let mut selected: Vec<&EnrichedTrack> = tracks.iter().filter(|t| filter.matches(t)).collect();
    selected.sort_by(by_popularity_desc);
    selected.truncate(limit);
    selected
}

// ============================================================================
// Timeline
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct YearDurations {
    pub year: i32,
    /// Mean duration in minutes of tracks above the threshold.
    pub above: Option<f64>,
    /// Mean duration in minutes of the remaining tracks.
    pub at_or_below: Option<f64>,
}

/// Mean track length per year, split at a popularity threshold.
/// Records with an unparsable year or duration, or a year past `max_year`,
/// are skipped.
pub fn duration_timeline(
    tracks: &[EnrichedTrack],
    threshold: u32,
    max_year: i32,
) -> Vec<YearDurations> {
    let mut years: FxHashMap<i32, (Mean, Mean)> = FxHashMap::default();
    for t in tracks {
        let (Some(year), Some(secs)) = (t.year_num(), t.duration_secs()) else {
            continue;
        };
        if year > max_year {
            continue;
        }
        let minutes = secs as f64 / 60.0;
        let entry = years.entry(year).or_default();
        if t.popularity > threshold {
            entry.0.add(minutes);
        } else {
            entry.1.add(minutes);
        }
    }

    let mut out: Vec<YearDurations> = years
        .into_iter()
        .map(|(year, (hi, lo))| YearDurations {
            year,
            above: hi.value(),
            at_or_below: lo.value(),
        })
        .collect();
    out.sort_by_key(|y| y.year);
    out
}

// ============================================================================
// Genre Race
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct YearGenres {
    pub year: i32,
    pub genres: Vec<GenreScore>,
}

/// For every year of the window, the `limit` genres with the best mean
/// popularity. Years without tracks yield an empty list.
pub fn genre_race(tracks: &[EnrichedTrack], window: YearWindow, limit: usize) -> Vec<YearGenres> {
    let mut per_year: FxHashMap<i32, FxHashMap<&str, Mean>> = FxHashMap::default();
    for t in tracks {
        let (Some(year), Some(genre)) = (t.year_num(), t.track_genre.as_deref()) else {
            continue;
        };
        if window.contains(year) {
            per_year
                .entry(year)
                .or_default()
                .entry(genre)
                .or_default()
                .add(t.popularity as f64);
        }
    }

    (window.from..=window.to)
        .map(|year| YearGenres {
            year,
            genres: per_year
                .get(&year)
                .map(|g| ranked_genres(g, limit))
                .unwrap_or_default(),
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
