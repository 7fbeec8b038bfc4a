use bedmake_dataset::BatchFormat;
use clap::Args;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Where to read serialized sample batches from.
#[derive(Debug, Clone, Args)]
pub struct BatchInputArgs {
    /// Directory containing the batch files (defaults to the tools config `head`).
    #[arg(long)]
    pub head: Option<PathBuf>,
    /// Batch encoding: pickle (.pkl) or json (.json).
    #[arg(long, value_enum, ignore_case = true)]
    pub format: Option<BatchFormat>,
}

/// Output root of a materialized dataset.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Materialized dataset root (defaults to the tools config `target`).
    #[arg(long)]
    pub target: Option<PathBuf>,
}

impl TargetArgs {
    /// Resolve against a configured default.
    pub fn resolve(&self, default: &std::path::Path) -> PathBuf {
        self.target
            .clone()
            .unwrap_or_else(|| default.to_path_buf())
    }
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Log level: trace, debug, info, warn or error.
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl LogArgs {
    pub fn level(&self) -> Level {
        self.log_level
    }
}

/// Install the global fmt subscriber at the requested level.
pub fn init_tracing(args: &LogArgs) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.level())
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        input: BatchInputArgs,
        #[command(flatten)]
        log: LogArgs,
    }

    #[test]
    fn format_flag_accepts_aliases() {
        let cli = TestCli::parse_from(["tool", "--format", "pkl", "--log-level", "WARN"]);
        assert_eq!(cli.input.format, Some(BatchFormat::Pickle));
        assert_eq!(cli.log.level(), Level::WARN);
        assert!(cli.input.head.is_none());
    }

    #[test]
    fn level_defaults_to_info() {
        let cli = TestCli::parse_from(["tool"]);
        assert_eq!(cli.log.level(), Level::INFO);
        assert!(cli.input.format.is_none());
    }

    #[test]
    fn misspelled_level_is_rejected() {
        let err = TestCli::try_parse_from(["tool", "--log-level", "deubg"]).err();
        assert!(err.is_some_and(|e| e.kind() == clap::error::ErrorKind::ValueValidation));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(TestCli::try_parse_from(["tool", "--format", "npz"]).is_err());
    }
}
