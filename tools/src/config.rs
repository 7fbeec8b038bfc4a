use std::path::{Path, PathBuf};

use bedmake_dataset::{image_format_for, BatchFormat, MaterializeConfig, Normalization};
use serde::Deserialize;
use training::{Backbone, TrainingConfig};
use tracing::warn;

const DEFAULT_CONFIG_NAME: &str = "bedmake-tools.toml";
const CONFIG_ENV: &str = "BEDMAKE_TOOLS_CONFIG";
const DEFAULT_HEAD: &str = "datasets/bedmake/cache_combo_v03_success";
const DEFAULT_TARGET: &str = "datasets/bedmake/cache_combo_v03_success_pytorch";

#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub head: PathBuf,
    pub target: PathBuf,
    pub format: BatchFormat,
    pub file_prefix: String,
    pub counter_width: usize,
    pub image_extension: String,
    pub normalization: Normalization,
    pub training: TrainingConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        let target = PathBuf::from(DEFAULT_TARGET);
        Self {
            head: PathBuf::from(DEFAULT_HEAD),
            format: BatchFormat::Pickle,
            file_prefix: "d".to_string(),
            counter_width: 5,
            image_extension: "png".to_string(),
            normalization: Normalization::default(),
            training: TrainingConfig {
                data_root: target.clone(),
                ..Default::default()
            },
            target,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ToolConfigFile {
    head: Option<String>,
    target: Option<String>,
    format: Option<BatchFormat>,
    file_prefix: Option<String>,
    counter_width: Option<usize>,
    image_extension: Option<String>,
    normalization: Option<NormalizationSection>,
    training: Option<TrainingSection>,
}

#[derive(Debug, Deserialize, Default)]
struct NormalizationSection {
    mean: Option<Vec<f64>>,
    std: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize, Default)]
struct TrainingSection {
    data_root: Option<String>,
    backbone: Option<Backbone>,
    pretrained: Option<bool>,
    epochs: Option<usize>,
    batch_size: Option<usize>,
    num_workers: Option<usize>,
    learning_rate: Option<f64>,
    momentum: Option<f64>,
    lr_step_size: Option<usize>,
    lr_gamma: Option<f64>,
}

impl ToolConfig {
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let cfg = Self::from_path(Path::new(&path)).unwrap_or_default();
            cfg.warn_if_invalid();
            return cfg;
        }
        let cfg = Self::from_path(Path::new(DEFAULT_CONFIG_NAME)).unwrap_or_default();
        cfg.warn_if_invalid();
        cfg
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("tools config {}: {e}; using defaults", path.display());
                return None;
            }
        };
        match Self::from_toml_str(&raw) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                warn!("tools config {}: {e}; using defaults", path.display());
                None
            }
        }
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let file: ToolConfigFile = toml::from_str(raw)?;
        Self::from_file(file)
    }

    fn from_file(file: ToolConfigFile) -> anyhow::Result<Self> {
        let defaults = ToolConfig::default();
        let head = file.head.map(|v| expand_path(&v)).unwrap_or(defaults.head);
        let target = file
            .target
            .map(|v| expand_path(&v))
            .unwrap_or(defaults.target);
        let format = file.format.unwrap_or(defaults.format);
        let image_extension = file
            .image_extension
            .map(|e| e.trim_start_matches('.').to_string())
            .unwrap_or(defaults.image_extension);
        image_format_for(&image_extension)?;

        let normalization = match file.normalization {
            Some(section) => Normalization {
                mean: section.mean.unwrap_or(defaults.normalization.mean),
                std: section.std.unwrap_or(defaults.normalization.std),
            },
            None => defaults.normalization,
        };

        let section = file.training.unwrap_or_default();
        let base = TrainingConfig::default();
        let training = TrainingConfig {
            data_root: section
                .data_root
                .map(|v| expand_path(&v))
                .unwrap_or_else(|| target.clone()),
            backbone: section.backbone.unwrap_or(base.backbone),
            pretrained: section.pretrained.unwrap_or(base.pretrained),
            epochs: section.epochs.unwrap_or(base.epochs),
            batch_size: section.batch_size.unwrap_or(base.batch_size),
            num_workers: section.num_workers.unwrap_or(base.num_workers),
            learning_rate: section.learning_rate.unwrap_or(base.learning_rate),
            momentum: section.momentum.unwrap_or(base.momentum),
            lr_step_size: section.lr_step_size.unwrap_or(base.lr_step_size),
            lr_gamma: section.lr_gamma.unwrap_or(base.lr_gamma),
            normalization: normalization.clone(),
            ..base
        };

        Ok(ToolConfig {
            head,
            target,
            format,
            file_prefix: file
                .file_prefix
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.file_prefix),
            counter_width: file.counter_width.unwrap_or(defaults.counter_width),
            image_extension,
            normalization,
            training,
        })
    }

    fn warn_if_invalid(&self) {
        if self.head.as_os_str().is_empty() {
            warn!("tools config: head is empty; materialize will read the working directory");
        }
        if self.counter_width == 0 {
            warn!("tools config: counter_width is 0; image names will not be zero-padded");
        }
        if let Err(e) = self.normalization.validate() {
            warn!("tools config: normalization is invalid: {e}");
        }
        if let Err(e) = self.training.validate() {
            warn!("tools config: training section is invalid: {e}");
        }
    }

    /// Materializer settings with optional CLI overrides.
    pub fn materialize_config(
        &self,
        head: Option<PathBuf>,
        target: Option<PathBuf>,
        format: Option<BatchFormat>,
    ) -> MaterializeConfig {
        MaterializeConfig {
            head: head.unwrap_or_else(|| self.head.clone()),
            target: target.unwrap_or_else(|| self.target.clone()),
            format: format.unwrap_or(self.format),
            file_prefix: self.file_prefix.clone(),
            counter_width: self.counter_width,
            image_extension: self.image_extension.clone(),
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

fn expand_env(input: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&format!("${{{key}}}")),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
