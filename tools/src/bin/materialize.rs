use anyhow::Context;
use bedmake_dataset::{materialize, Split};
use bedmake_tools::ToolConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "materialize",
    about = "Convert serialized depth-sample batches into a train/valid image-folder dataset"
)]
struct Args {
    #[command(flatten)]
    input: cli_support::BatchInputArgs,
    #[command(flatten)]
    output: cli_support::TargetArgs,
    #[command(flatten)]
    log: cli_support::LogArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    cli_support::init_tracing(&args.log)?;
    let cfg = ToolConfig::load();

    let mat_cfg = cfg.materialize_config(
        args.input.head.clone(),
        args.output.target.clone(),
        args.input.format,
    );
    let target = mat_cfg.target.clone();
    let summary = materialize(mat_cfg)
        .with_context(|| format!("materializing into {}", target.display()))?;

    println!(
        "done loading data, success {} vs failure {} (total {})",
        summary.totals.success,
        summary.totals.failure,
        summary.total_samples()
    );
    for split in Split::ALL {
        let counts = summary.split(split);
        println!(
            " - {}: success={} failure={}",
            split, counts.success, counts.failure
        );
    }
    println!(
        "pixels: {}  (single-channel mean/std info)",
        summary.pixel_count
    );
    match summary.pixel_stats {
        Some(stats) => {
            println!("mean: {}", stats.mean);
            println!("std:  {}", stats.std);
        }
        None => println!("mean/std: n/a (no pixels seen)"),
    }
    Ok(())
}
