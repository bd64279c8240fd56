// Martelage report
//
// Purpose: Run one aggregation pass over an inventory snapshot and print the stand summary
// Usage: cargo run --features cli --bin martelage_report -- <config.json> <inventory.json> [--json]

use anyhow::{bail, Result};
use martelage_engine::{compute_for_snapshot, EngineConfig, InventorySnapshot, MartelageStats};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: martelage_report <config.json> <inventory.json> [--json]";

#[derive(Debug, PartialEq)]
struct ReportArgs<'a> {
    config: &'a str,
    inventory: &'a str,
    as_json: bool,
}

fn parse_args(args: &[String]) -> Result<ReportArgs<'_>> {
    let mut as_json = false;
    let mut paths: Vec<&str> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--json" => as_json = true,
            flag if flag.starts_with("--") => bail!("unknown option: {}\n{}", flag, USAGE),
            path => paths.push(path),
        }
    }
    match paths.as_slice() {
        [config, inventory] => Ok(ReportArgs {
            config: *config,
            inventory: *inventory,
            as_json,
        }),
        _ => bail!(USAGE),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "martelage_engine=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&args)?;

    let config = EngineConfig::load(Path::new(args.config))?.prepare()?;
    let snapshot = InventorySnapshot::load(Path::new(args.inventory))?;
    tracing::info!(
        "Loaded {} stems over {:.0} m² (tariff {})",
        snapshot.stems.len(),
        snapshot.surface_m2,
        config.tariff.method()
    );

    let start = Instant::now();
    let Some(stats) = compute_for_snapshot(&config, &snapshot) else {
        bail!("nothing to aggregate: no stems, no surface or empty species selection");
    };
    tracing::info!("Aggregation pass: {:.2?}", start.elapsed());

    if args.as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_summary(&stats);
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>, digits: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.*}", digits, v))
}

fn print_summary(stats: &MartelageStats) {
    println!("\n{}", "=".repeat(72));
    println!("MARTELAGE SUMMARY ({:.2} ha)", stats.surface_ha);
    println!("{}", "=".repeat(72));

    println!("Stems:        {} ({:.1}/ha)", stats.n_total, stats.n_per_ha);
    println!("Basal area:   {:.2} m² ({:.2} m²/ha)", stats.g_total_m2, stats.g_per_ha_m2);
    println!(
        "Volume:       {} m³ ({} m³/ha)",
        fmt_opt(stats.volume_total_m3, 2),
        fmt_opt(stats.volume_per_ha_m3, 2)
    );
    println!(
        "Revenue:      {} EUR ({} EUR/ha)",
        fmt_opt(stats.revenue_total_eur, 0),
        fmt_opt(stats.revenue_per_ha_eur, 0)
    );
    println!(
        "Dg: {} cm  Lorey: {} m  CV(D): {} %",
        fmt_opt(stats.dg_cm, 1),
        fmt_opt(stats.lorey_height_m, 1),
        fmt_opt(stats.diameter_cv_percent, 1)
    );

    println!("\n{:<24} {:>6} {:>10} {:>10} {:>10}", "Species", "N", "G m²", "V m³", "EUR");
    for row in &stats.species {
        println!(
            "{:<24} {:>6} {:>10.2} {:>10} {:>10}",
            row.name,
            row.count,
            row.basal_area_m2,
            fmt_opt(row.volume_m3, 2),
            fmt_opt(row.value_eur, 0)
        );
    }

    if !stats.missing_heights.is_empty() {
        println!("\nMissing heights:");
        for missing in &stats.missing_heights {
            println!("  {}: classes {:?}", missing.name, missing.classes);
        }
    }
    if !stats.failed_species.is_empty() {
        println!("\nFailed species:");
        for failure in &stats.failed_species {
            println!("  {}: {}", failure.name, failure.reason);
        }
    }
    if let Some(unpriced) = stats.unpriced_volume_total_m3.filter(|v| *v > 0.0) {
        println!(
            "\nUnpriced volume: {:.2} m³ ({})",
            unpriced,
            stats.unpriced_species.join(", ")
        );
    }
    for special in &stats.special_trees {
        println!("{}: {}", special.label, special.count);
    }
    if !stats.warnings.is_empty() {
        println!("\n{} plausibility warning(s)", stats.warnings.len());
    }
}
