use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use trace_reconcile::{
    load_ratings, load_transaction_batch, write_reconciled_csv, PeriodBatch,
    PipelineConfig, ReconcilePipeline, TradeLevelFilter,
};

struct CliArgs {
    ratings_path: PathBuf,
    batch_specs: Vec<(i32, String, PathBuf)>,
    output_path: Option<PathBuf>,
    summary_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let cli = parse_args(&args[1..])?;
    run_reconcile(cli)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} <ratings.csv> <period:ERA:batch.csv>... [--output out.csv] [--summary summary.json]");
    eprintln!();
    eprintln!("  Each batch spec names a reporting period, its schema era");
    eprintln!("  (EARLY or LATE), and the CSV file holding its raw reports.");
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut ratings_path = None;
    let mut batch_specs = Vec::new();
    let mut output_path = None;
    let mut summary_path = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--output" => {
                let value = iter.next().context("--output requires a path")?;
                output_path = Some(PathBuf::from(value));
            }
            "--summary" => {
                let value = iter.next().context("--summary requires a path")?;
                summary_path = Some(PathBuf::from(value));
            }
            spec if spec.contains(':') => {
                let parts: Vec<&str> = spec.splitn(3, ':').collect();
                if parts.len() != 3 {
                    bail!("bad batch spec '{spec}', expected period:ERA:path");
                }
                let period: i32 = parts[0]
                    .parse()
                    .with_context(|| format!("bad period in batch spec '{spec}'"))?;
                batch_specs.push((period, parts[1].to_string(), PathBuf::from(parts[2])));
            }
            path if ratings_path.is_none() => {
                ratings_path = Some(PathBuf::from(path));
            }
            other => bail!("unexpected argument '{other}'"),
        }
    }

    let ratings_path = ratings_path.context("missing ratings file argument")?;
    if batch_specs.is_empty() {
        bail!("no transaction batches given");
    }

    Ok(CliArgs {
        ratings_path,
        batch_specs,
        output_path,
        summary_path,
    })
}

fn run_reconcile(cli: CliArgs) -> Result<()> {
    println!("🔄 Transaction Report Reconciliation v{}", trace_reconcile::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load rating events
    println!("\n📊 Loading rating events...");
    let (ratings, rating_counts) = load_ratings(&cli.ratings_path)?;
    println!(
        "✓ Loaded {} rating events ({} excluded)",
        rating_counts.loaded,
        rating_counts.unknown_source + rating_counts.unknown_label + rating_counts.missing_key
    );

    // 2. Load period batches
    println!("\n📂 Loading transaction batches...");
    let mut batches: Vec<PeriodBatch> = Vec::with_capacity(cli.batch_specs.len());
    for (period, era_tag, path) in &cli.batch_specs {
        let batch = load_transaction_batch(path, era_tag, *period)
            .with_context(|| format!("loading batch for period {period}"))?;
        println!("✓ Period {} ({}): {} rows", batch.period, batch.era, batch.rows.len());
        batches.push(batch);
    }

    // 3. Reconcile
    println!("\n🔍 Reconciling...");
    let pipeline = ReconcilePipeline::new(PipelineConfig::default());
    let output = pipeline.run(batches, ratings)?;

    for counts in &output.summary.periods {
        println!(
            "✓ Period {} ({}): {} voided by corrections, {} by reversals",
            counts.period,
            counts.era,
            counts.corrections_voided,
            counts.reversals_voided
        );
    }
    println!(
        "✓ Duplicate sides dropped: {}",
        output.summary.duplicate_sides_dropped
    );
    println!(
        "✓ Rating join: {} matched, {} without rating",
        output.summary.rating_join.matched,
        output.summary.rating_join.unmatched
    );

    // 4. Trade-level screens
    println!("\n🧹 Applying trade-level screens...");
    let filter = TradeLevelFilter::default();
    let filtered = filter.apply(output.transactions);
    println!(
        "✓ {} transactions retained ({} screened out)",
        filtered.retained.len(),
        filtered.counts.total()
    );

    // 5. Write output
    if let Some(path) = &cli.output_path {
        println!("\n💾 Writing reconciled transactions...");
        write_reconciled_csv(path, &filtered.retained)?;
        println!("✓ Wrote {}", path.display());
    }
    if let Some(path) = &cli.summary_path {
        write_summary_json(path, &output.summary)?;
        println!("✓ Wrote {}", path.display());
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "🎉 Run {} complete: {} reconciled transactions",
        output.summary.run_id,
        filtered.retained.len()
    );

    Ok(())
}

fn write_summary_json(path: &Path, summary: &trace_reconcile::ReconcileSummary) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
