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
#[command(about = "threadsafe workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the lock and token benchmarks and write a comparison report
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,
    },
}

const BENCH_TARGETS: &[&str] = &["spin_rwlock_benchmark", "access_benchmark"];

/// Report columns, in order. Relative numbers are against the first one
/// present in a row.
const BACKENDS: &[&str] = &["std", "onethread", "primitive", "spinlock", "rw_mutex"];

/// workload -> backend -> operations per second
type Results = BTreeMap<String, BTreeMap<String, f64>>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench { quick, report_only } => {
            if !report_only {
                run_benchmarks(quick)?;
            }
            generate_report()?;
        }
    }

    Ok(())
}

fn run_benchmarks(quick: bool) -> Result<()> {
    println!("Compiling benchmarks...");
    let status = Command::new("cargo")
        .args(["bench", "--no-run"])
        .status()
        .context("failed to spawn cargo")?;
    if !status.success() {
        anyhow::bail!("Failed to compile benchmarks");
    }

    for target in BENCH_TARGETS {
        println!("\n>>> Running {target}");
        let start = Instant::now();

        let mut cmd = Command::new("cargo");
        cmd.env("CARGO_INCREMENTAL", "0");
        cmd.args(["bench", "--bench", target]);

        // Args for the test runner (Criterion) go after --
        cmd.arg("--");
        if quick {
            cmd.args(["--measurement-time", "0.1", "--sample-size", "10", "--noplot"]);
        }

        let status = cmd
            .status()
            .with_context(|| format!("Failed to run bench {target}"))?;

        if status.success() {
            println!("Finished {target} in {:.2?}", start.elapsed());
        } else {
            eprintln!("Warning: benchmark {target} failed");
        }
    }

    Ok(())
}

fn generate_report() -> Result<()> {
    println!("\n>>> Generating Report...");

    let criterion_dir = Path::new("target/criterion");
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    let mut results = Results::new();
    collect_results(criterion_dir, &mut results)?;

    let report_path = Path::new("benchmark_results/report.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(report_path)
        .with_context(|| format!("cannot create {}", report_path.display()))?;

    writeln!(file, "# Lock Backend Benchmark Report")?;
    writeln!(file)?;

    write!(file, "| Workload |")?;
    for backend in BACKENDS {
        write!(file, " {backend} (Ops/s) | rel |")?;
    }
    writeln!(file)?;

    write!(file, "|---|")?;
    for _ in BACKENDS {
        write!(file, "---|---|")?;
    }
    writeln!(file)?;

    for (workload, row) in &results {
        write!(file, "| {workload} |")?;
        let reference = BACKENDS.iter().find_map(|b| row.get(*b)).copied();

        for backend in BACKENDS {
            match (row.get(*backend), reference) {
                (Some(ops), Some(base)) if base > 0.0 => {
                    write!(file, " {} | **{:.2}x** |", format_ops(*ops), ops / base)?;
                }
                (Some(ops), _) => write!(file, " {} | - |", format_ops(*ops))?,
                (None, _) => write!(file, " N/A | - |")?,
            }
        }
        writeln!(file)?;
    }

    println!("Report written to {}", report_path.display());
    Ok(())
}

fn format_ops(ops: f64) -> String {
    if ops > 1_000_000.0 {
        format!("{:.2}M", ops / 1_000_000.0)
    } else if ops > 1_000.0 {
        format!("{:.2}K", ops / 1_000.0)
    } else {
        format!("{ops:.0}")
    }
}

/// Walks criterion's output tree. Each measurement lives at
/// `<group>/<function>/new/estimates.json` next to a `benchmark.json`.
fn collect_results(dir: &Path, results: &mut Results) -> Result<()> {
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().and_then(|s| s.to_str()) != Some("report") {
                collect_results(&path, results)?;
            }
            continue;
        }
        if path.file_name().and_then(|s| s.to_str()) != Some("estimates.json") {
            continue;
        }

        let Some(run_dir) = path.parent() else { continue };
        if run_dir.file_name().and_then(|s| s.to_str()) != Some("new") {
            continue;
        }
        let Some(function_dir) = run_dir.parent() else { continue };
        let Some(group_dir) = function_dir.parent() else { continue };
        let (Some(function), Some(group)) = (dir_name(function_dir), dir_name(group_dir)) else {
            continue;
        };

        let elements = read_json(&run_dir.join("benchmark.json"))
            .and_then(|json| json.get("throughput")?.get("Elements")?.as_f64())
            .unwrap_or(1.0);
        let mean_ns = read_json(&path)
            .and_then(|json| json.get("mean")?.get("point_estimate")?.as_f64())
            .unwrap_or(0.0);

        if mean_ns > 0.0 {
            results
                .entry(group)
                .or_default()
                .insert(function, elements * 1e9 / mean_ns);
        }
    }
    Ok(())
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name()?.to_str().map(str::to_owned)
}

fn read_json(path: &Path) -> Option<serde_json::Value> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
