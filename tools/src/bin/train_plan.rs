use anyhow::Context;
use bedmake_dataset::{read_summary, SUMMARY_FILE};
use bedmake_tools::ToolConfig;
use clap::Parser;
use training::TrainArgs;

#[derive(Parser, Debug)]
#[command(
    name = "train_plan",
    about = "Print the training configuration for a materialized dataset as JSON"
)]
struct Args {
    #[command(flatten)]
    train: TrainArgs,
    /// Keep the configured normalization even if the dataset has a summary.
    #[arg(long, default_value_t = false)]
    ignore_summary: bool,
    #[command(flatten)]
    log: cli_support::LogArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    cli_support::init_tracing(&args.log)?;
    let cfg = ToolConfig::load();

    let mut plan = args.train.apply(cfg.training.clone());
    let summary_path = plan.data_root.join(SUMMARY_FILE);
    if !args.ignore_summary && summary_path.exists() {
        let summary = read_summary(&summary_path)
            .with_context(|| format!("reading {}", summary_path.display()))?;
        plan = plan.with_summary(&summary);
        tracing::info!(summary = %summary_path.display(), "normalization taken from dataset summary");
    }
    plan.validate()?;
    for (channel, (low, high)) in plan.normalization.input_range().into_iter().enumerate() {
        tracing::info!(channel, low, high, "normalized input range");
    }

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
