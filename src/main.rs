use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use track_enrich::dataset::{ensure_dataset, read_tracks, DEFAULT_DATASET};
use track_enrich::models::EnrichStats;
use track_enrich::output::{write_dataset, DEFAULT_OUTPUT};
use track_enrich::progress::{format_elapsed, init_logging, set_log_only};
use track_enrich::safety::validate_output_path;
use track_enrich::spotify::SpotifyClient;
use track_enrich::transform::{
    batch_count, fetch_all, merge, select_hits, FetchOptions, BATCH_SIZE, MIN_POPULARITY,
};

#[derive(Parser)]
#[command(name = "track-enrich")]
#[command(about = "Enrich a tracks dataset with release year, artwork, preview and region")]
struct Args {
    /// Output JSON file
    #[arg(default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Use a local CSV instead of the downloaded dataset
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Kaggle dataset handle (owner/slug)
    #[arg(long, default_value = DEFAULT_DATASET)]
    dataset: String,

    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    client_id: String,

    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Minimum popularity for a track to be enriched
    #[arg(long, default_value_t = MIN_POPULARITY)]
    min_popularity: u32,

    /// Ids per request, at most 50
    #[arg(long, default_value_t = BATCH_SIZE)]
    batch_size: usize,

    /// Pause after each request, in milliseconds
    #[arg(long, default_value = "500")]
    pause_ms: u64,

    /// Only process the first N selected tracks (dry runs)
    #[arg(long)]
    max_tracks: Option<usize>,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide progress bars and log periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);
    set_log_only(args.log_only);

    let start = Instant::now();
    let mut stats = EnrichStats::default();

    // Phase 1: extract
    let source = match &args.csv {
        Some(path) => path.clone(),
        None => ensure_dataset(&args.dataset)?,
    };
    validate_output_path(&args.output, "json", &[source.as_path()])?;

    info!("Reading CSV: {}", source.display());
    let loaded = read_tracks(&source)?;
    stats.rows_read = loaded.tracks.len();
    stats.rows_skipped = loaded.skipped;
    if loaded.skipped > 0 {
        warn!("{} CSV rows could not be parsed", loaded.skipped);
    }

    // Phase 2: select
    let mut hits = select_hits(loaded.tracks, args.min_popularity, &mut stats);
    if let Some(max) = args.max_tracks {
        hits.truncate(max);
        stats.hits_selected = hits.len();
    }
    info!("Processing {} tracks...", hits.len());

    // Phase 3: fetch
    let mut client = SpotifyClient::connect(&args.client_id, &args.client_secret)
        .context("Failed to obtain a Spotify access token")?;

    let track_ids: Vec<String> = hits.iter().map(|t| t.track_id.clone()).collect();
    let options = FetchOptions {
        batch_size: args.batch_size.clamp(1, BATCH_SIZE),
        pause: Duration::from_millis(args.pause_ms),
    };
    info!(
        "Fetching metadata in {} batches of {}",
        batch_count(track_ids.len(), options.batch_size),
        options.batch_size
    );
    let metadata = fetch_all(&mut client, &track_ids, &options, &mut stats);

    // Phase 4: merge + write
    info!("Merging metadata...");
    let enriched = merge(hits, &metadata, &mut stats);
    write_dataset(&args.output, &enriched)?;

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_summary();
    if let Some(path) = &args.stats {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
    }

    info!(
        "Done: {} tracks written to '{}' ({:.1}% of selected) in {}",
        enriched.len(),
        args.output.display(),
        stats.enrich_rate(),
        format_elapsed(start.elapsed())
    );
    Ok(())
}
