//! Descriptive statistics over the enriched dataset.
//!
//! Usage: dataset-stats [--dataset dataset_final.json] <kpis|geo|genres|top|timeline|genre-race>

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use track_enrich::analysis::{
    duration_timeline, format_secs, genre_race, genre_stats, geography, kpis, top_tracks,
    TrackFilter, YearWindow, HIT_THRESHOLD, TOP_LIMIT,
};
use track_enrich::models::EnrichedTrack;
use track_enrich::output::{read_dataset, DEFAULT_OUTPUT};
use track_enrich::progress::init_logging;
use track_enrich::region::Region;

#[derive(Parser)]
#[command(name = "dataset-stats")]
#[command(about = "Aggregate statistics over an enriched dataset")]
struct Args {
    #[arg(long, global = true, default_value = DEFAULT_OUTPUT)]
    dataset: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone, Copy)]
struct FilterArgs {
    #[arg(long, value_enum)]
    region: Option<Region>,

    /// Single release year; defaults to the 1980-2022 window
    #[arg(long)]
    year: Option<i32>,
}

impl FilterArgs {
    fn filter(self) -> TrackFilter {
        TrackFilter {
            region: self.region,
            year: self.year,
            window: YearWindow::default(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Totals: songs, artists, top region, mean duration
    Kpis,
    /// Track counts and popularity per region and country
    Geo,
    /// Per-genre counts, hits and audio averages
    Genres {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Most popular tracks
    Top {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long, default_value_t = TOP_LIMIT)]
        limit: usize,
    },
    /// Mean duration per year, above vs. at-or-below a popularity threshold
    Timeline {
        #[arg(long, default_value_t = 50)]
        threshold: u32,

        #[arg(long, default_value_t = 2022)]
        max_year: i32,
    },
    /// Best genres by mean popularity for each year
    GenreRace {
        #[arg(long, default_value_t = 1980)]
        from: i32,

        #[arg(long, default_value_t = 2023)]
        to: i32,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fmt_minutes(m: Option<f64>) -> String {
    m.map(|m| format_secs(m * 60.0))
        .unwrap_or_else(|| "--:--".to_string())
}

fn run(command: &Command, tracks: &[EnrichedTrack], json: bool) -> Result<()> {
    match command {
        Command::Kpis => {
            let k = kpis(tracks);
            if json {
                return print_json(&k);
            }
            println!("Songs:         {}", k.total_songs);
            println!("Artists:       {}", k.distinct_artists);
            println!(
                "Top region:    {}",
                k.top_region.map(|r| r.to_string()).unwrap_or_else(|| "-".into())
            );
            println!("Mean duration: {}", k.avg_duration.as_deref().unwrap_or("--:--"));
        }
        Command::Geo => {
            let geo = geography(tracks);
            if json {
                return print_json(&geo);
            }
            println!("Countries: {}", geo.countries.len());
            if let Some((code, n)) = geo.countries.first() {
                println!("Top country: {} ({} tracks)", code, n);
            }
            println!("\n{:<36} {:>7} {:>8}  top genres", "region", "tracks", "avg pop");
            for r in &geo.regions {
                let genres: Vec<String> = r
                    .top_genres
                    .iter()
                    .map(|g| format!("{} {:.1}", g.genre, g.avg_popularity))
                    .collect();
                println!(
                    "{:<36} {:>7} {:>8.1}  {}",
                    r.label(),
                    r.count,
                    r.avg_popularity,
                    genres.join(", ")
                );
            }
        }
        Command::Genres { filter } => {
            let stats = genre_stats(tracks, &filter.filter());
            if json {
                return print_json(&stats);
            }
            println!(
                "{:<24} {:>7} {:>6} {:>8} {:>6} {:>6}",
                "genre", "tracks", "hits", "avg pop", "dance", "energy"
            );
            for g in &stats {
                println!(
                    "{:<24} {:>7} {:>6} {:>8.1} {:>6.2} {:>6.2}",
                    g.genre, g.count, g.hits, g.avg_popularity, g.avg_danceability, g.avg_energy
                );
            }
            println!("\n(hit = popularity > {})", HIT_THRESHOLD);
        }
        Command::Top { filter, limit } => {
            let top = top_tracks(tracks, &filter.filter(), *limit);
            if json {
                return print_json(&top);
            }
            if top.is_empty() {
                println!("No track found.");
            }
            for (i, t) in top.iter().enumerate() {
                println!(
                    "#{:<3} {:>3}  {} - {} [{}] {} BPM, dance {}%",
                    i + 1,
                    t.popularity,
                    t.artists.as_deref().unwrap_or("Unknown artist"),
                    t.track_name.as_deref().unwrap_or("Unknown title"),
                    t.track_genre.as_deref().unwrap_or("N/A"),
                    t.tempo.unwrap_or_default().round(),
                    (t.danceability.unwrap_or_default() * 100.0).round()
                );
            }
        }
        Command::Timeline { threshold, max_year } => {
            let timeline = duration_timeline(tracks, *threshold, *max_year);
            if json {
                return print_json(&timeline);
            }
            println!("{:<6} {:>10} {:>10}", "year", format!("> {}", threshold), format!("<= {}", threshold));
            for y in &timeline {
                println!(
                    "{:<6} {:>10} {:>10}",
                    y.year,
                    fmt_minutes(y.above),
                    fmt_minutes(y.at_or_below)
                );
            }
        }
        Command::GenreRace { from, to, limit } => {
            let window = YearWindow::new(*from.min(to), *from.max(to));
            let race = genre_race(tracks, window, *limit);
            if json {
                return print_json(&race);
            }
            for y in race.iter().filter(|y| !y.genres.is_empty()) {
                let genres: Vec<String> = y
                    .genres
                    .iter()
                    .map(|g| format!("{} {:.1}", g.genre, g.avg_popularity))
                    .collect();
                println!("{}: {}", y.year, genres.join(", "));
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging(false, false);
    let args = Args::parse();

    let tracks = read_dataset(&args.dataset)?;
    log::info!("Loaded {} tracks from {}", tracks.len(), args.dataset.display());

    run(&args.command, &tracks, args.json)
}
