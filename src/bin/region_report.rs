//! Popularity report for one region over a window of release years.
//!
//! Usage: region-report [dataset_final.json] [--region latin-america] [--from 1980] [--to 2022]

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use track_enrich::analysis::{region_report, TrackLine, YearWindow, HIT_THRESHOLD};
use track_enrich::output::{read_dataset, DEFAULT_OUTPUT};
use track_enrich::progress::init_logging;
use track_enrich::region::Region;

#[derive(Parser)]
#[command(name = "region-report")]
#[command(about = "Summarize popularity of one region's tracks")]
struct Args {
    #[arg(default_value = DEFAULT_OUTPUT)]
    dataset: PathBuf,

    #[arg(long, value_enum, default_value = "latin-america")]
    region: Region,

    #[arg(long, default_value_t = YearWindow::default().from)]
    from: i32,

    #[arg(long, default_value_t = YearWindow::default().to)]
    to: i32,

    /// Tracks strictly above this popularity are listed as hits
    #[arg(long, default_value_t = HIT_THRESHOLD)]
    threshold: u32,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn print_table(lines: &[TrackLine]) {
    println!("{:<40} {:<30} {:>6} {:>10}", "track_name", "artists", "year", "popularity");
    for l in lines {
        println!(
            "{:<40} {:<30} {:>6} {:>10}",
            truncate(l.track_name.as_deref().unwrap_or("-"), 40),
            truncate(l.artists.as_deref().unwrap_or("-"), 30),
            l.year,
            l.popularity
        );
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width - 1).collect();
        out.push('…');
        out
    }
}

fn main() -> Result<()> {
    init_logging(false, false);
    let args = Args::parse();

    let tracks = read_dataset(&args.dataset)?;
    log::info!("Loaded {} tracks from {}", tracks.len(), args.dataset.display());

    let window = YearWindow::new(args.from.min(args.to), args.from.max(args.to));
    let report = region_report(&tracks, args.region, window, args.threshold);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nREPORT FOR: {} ({}-{})", report.region, window.from, window.to);
    println!("Tracks found in the dataset: {}", report.total);

    if report.total == 0 {
        println!("No track found for this region. Regions present in the dataset:");
        for r in &report.regions_present {
            println!("  - {}", r);
        }
        return Ok(());
    }

    if let (Some(max), Some(avg)) = (report.max_popularity, report.avg_popularity) {
        println!("Maximum popularity: {}/100", max);
        println!("Mean popularity: {:.2}/100", avg);
    }

    println!("\nTracks above {}: {}", report.threshold, report.hits.len());
    if report.hits.is_empty() {
        println!("\nNo track exceeds {}.", report.threshold);
        println!("--- Top {} of this region ---", report.fallback_top.len());
        print_table(&report.fallback_top);
    } else {
        println!("\n--- Hits ---");
        print_table(&report.hits);
    }

    Ok(())
}
