use anyhow::Context;
use bedmake_dataset::{MaterializedDataset, Split};
use bedmake_tools::ToolConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "dataset_stats",
    about = "Index a materialized dataset and recompute its pixel statistics from the images"
)]
struct Args {
    #[command(flatten)]
    target: cli_support::TargetArgs,
    /// Maximum allowed difference between stored and recomputed mean/std.
    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,
    #[command(flatten)]
    log: cli_support::LogArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    cli_support::init_tracing(&args.log)?;
    let cfg = ToolConfig::load();
    let root = args.target.resolve(&cfg.target);

    let dataset = MaterializedDataset::open(&root)
        .with_context(|| format!("opening dataset at {}", root.display()))?;
    for split in Split::ALL {
        let folder = dataset.split(split);
        let counts: Vec<String> = folder
            .class_names()
            .iter()
            .enumerate()
            .map(|(idx, name)| format!("{idx}:{name}={}", folder.count_for(name)))
            .collect();
        println!("{split}: {} images [{}]", folder.len(), counts.join(" "));
    }

    let check = dataset.check_stats()?;
    match check.recomputed {
        Some(stats) => println!(
            "recomputed: pixels={} mean={} std={}",
            check.recomputed_pixels, stats.mean, stats.std
        ),
        None => println!("recomputed: no pixels"),
    }
    if dataset.summary.is_none() {
        println!("no summary found; nothing to compare against");
        return Ok(());
    }
    if let Some(stats) = check.stored {
        println!(
            "stored:     pixels={} mean={} std={}",
            check.stored_pixels, stats.mean, stats.std
        );
    }
    if !check.matches(args.tolerance) {
        anyhow::bail!("recomputed statistics differ from the stored summary");
    }
    println!("statistics match");
    Ok(())
}
