use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "lazybox workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the LazyBox benchmarks and write a comparison report
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,
    },
    /// Model-check the synchronization code with loom
    Loom,
}

const BENCH: &str = "lazy_box_benchmark";
const BASELINE: &str = "lazy_box";

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench { quick, report_only } => {
            if !report_only {
                run_benchmarks(quick)?;
            }
            generate_report()?;
        }
        Commands::Loom => run_loom()?,
    }

    Ok(())
}

fn run_benchmarks(quick: bool) -> Result<()> {
    println!("Running {}...", BENCH);
    let start = Instant::now();

    let mut cmd = Command::new("cargo");
    cmd.env("CARGO_INCREMENTAL", "0");
    cmd.arg("bench").arg("--bench").arg(BENCH);

    // Args for the test runner (Criterion) go after --
    cmd.arg("--");
    cmd.arg("--save-baseline").arg(BASELINE);

    if quick {
        cmd.arg("--measurement-time").arg("0.1");
        cmd.arg("--noplot");
        cmd.arg("--sample-size").arg("10");
    }

    let status = cmd.status().context("Failed to launch cargo bench")?;
    if !status.success() {
        anyhow::bail!("Benchmark run failed");
    }
    println!("Finished in {:.2?}", start.elapsed());
    Ok(())
}

fn run_loom() -> Result<()> {
    let status = Command::new("cargo")
        .env("RUSTFLAGS", "--cfg loom")
        .args(["test", "--lib", "--release", "loom_"])
        .status()
        .context("Failed to launch cargo test")?;
    if !status.success() {
        anyhow::bail!("loom model checking failed");
    }
    Ok(())
}

fn generate_report() -> Result<()> {
    println!("\n>>> Generating Report...");
    // group -> implementation -> mean ns
    let mut results: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();

    let criterion_dir = Path::new("target/criterion");
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    for group in fs::read_dir(criterion_dir)?.flatten() {
        let group_path = group.path();
        if !group_path.is_dir() || group.file_name() == "report" {
            continue;
        }
        for imp in fs::read_dir(&group_path)?.flatten() {
            let estimates = imp.path().join(BASELINE).join("estimates.json");
            if let Some(mean) = read_mean_ns(&estimates) {
                results
                    .entry(group.file_name().to_string_lossy().into_owned())
                    .or_default()
                    .insert(imp.file_name().to_string_lossy().into_owned(), mean);
            }
        }
    }

    let report_path = Path::new("benchmark_results/report.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(report_path)?;

    writeln!(file, "# LazyBox Benchmark Report")?;
    for (group, imps) in &results {
        writeln!(file, "\n## {}\n", group)?;
        writeln!(file, "| Implementation | Mean | vs lazy_box |")?;
        writeln!(file, "|---|---|---|")?;

        let ours = imps.get("lazy_box").copied().unwrap_or(0.0);
        for (name, ns) in imps {
            let rel = if ours > 0.0 { ns / ours } else { 0.0 };
            writeln!(file, "| {} | {} | **{:.2}x** |", name, format_ns(*ns), rel)?;
        }
    }

    println!("Report written to {}", report_path.display());
    Ok(())
}

fn read_mean_ns(path: &Path) -> Option<f64> {
    let content = fs::read_to_string(path).ok()?;
    let json: serde_json::Value = serde_json::from_str(&content).ok()?;
    json.get("mean")?.get("point_estimate")?.as_f64()
}

fn format_ns(ns: f64) -> String {
    if ns > 1_000_000.0 {
        format!("{:.2} ms", ns / 1_000_000.0)
    } else if ns > 1_000.0 {
        format!("{:.2} µs", ns / 1_000.0)
    } else {
        format!("{:.1} ns", ns)
    }
}
