// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 流水线配置参数
// JSON 配置文件 + 命令行覆盖

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::capture::{ModelImageProperties, SchedulerConfig};
use crate::models::{DecodeMode, YoloDecoder};

/// Everything the pipeline can be tuned with, in one place.
///
/// Deserializes from JSON with every field optional; missing fields take the
/// defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-class confidence threshold; detections must score strictly above
    /// it.
    pub conf: f32,
    /// Issue one capture request every this many ticks.
    pub frame_mod: u64,
    /// Network input resolution (fixed for the process lifetime).
    pub model_width: u32,
    pub model_height: u32,
    /// Number of classes the model predicts.
    pub num_classes: usize,
    /// Which detections survive decoding.
    pub decode_mode: DecodeMode,
    /// Cap on queued inference tasks; `None` means unbounded.
    pub max_backlog: Option<usize>,
    /// Dump each captured frame as PNG into this directory.
    pub dump_dir: Option<PathBuf>,
    /// `index:label` class-name file; missing file yields empty labels.
    pub class_labels: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            conf: 0.65,
            frame_mod: 5,
            model_width: 640,
            model_height: 480,
            num_classes: 80,
            decode_mode: DecodeMode::default(),
            max_backlog: Some(8),
            dump_dir: None,
            class_labels: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))
    }

    pub fn model_image(&self) -> ModelImageProperties {
        ModelImageProperties {
            width: self.model_width,
            height: self.model_height,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            frame_mod: self.frame_mod,
            max_backlog: self.max_backlog,
            dump_dir: self.dump_dir.clone(),
        }
    }

    pub fn decoder(&self) -> YoloDecoder {
        YoloDecoder::new(self.conf, self.num_classes, self.decode_mode)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Scene-capture object-detection pipeline")]
pub struct Args {
    /// JSON config file; explicit flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Confidence threshold (strictly-greater comparison)
    #[arg(long)]
    pub conf: Option<f32>,

    /// Capture every N ticks
    #[arg(long)]
    pub frame_mod: Option<u64>,

    /// Model input width
    #[arg(long)]
    pub model_width: Option<u32>,

    /// Model input height
    #[arg(long)]
    pub model_height: Option<u32>,

    /// Number of classes the model predicts
    #[arg(long)]
    pub nc: Option<usize>,

    /// Decode mode: per-class or best-overall
    #[arg(long, value_enum)]
    pub decode_mode: Option<DecodeMode>,

    /// Max queued inference tasks; 0 removes the bound
    #[arg(long)]
    pub max_backlog: Option<usize>,

    /// Dump captured frames as PNG into this directory
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Class-label file, one `index:label` per line
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Synthetic capture source width
    #[arg(long, default_value_t = 1280)]
    pub screen_width: u32,

    /// Synthetic capture source height
    #[arg(long, default_value_t = 720)]
    pub screen_height: u32,

    /// Ticks to drive the demo loop for
    #[arg(long, default_value_t = 120)]
    pub ticks: u64,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = 8)]
    pub tick_ms: u64,

    /// Log at debug level
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    /// Merge the optional JSON file with explicit CLI overrides.
    pub fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(v) = self.conf {
            cfg.conf = v;
        }
        if let Some(v) = self.frame_mod {
            cfg.frame_mod = v.max(1);
        }
        if let Some(v) = self.model_width {
            cfg.model_width = v;
        }
        if let Some(v) = self.model_height {
            cfg.model_height = v;
        }
        if let Some(v) = self.nc {
            cfg.num_classes = v;
        }
        if let Some(v) = self.decode_mode {
            cfg.decode_mode = v;
        }
        if let Some(v) = self.max_backlog {
            cfg.max_backlog = if v == 0 { None } else { Some(v) };
        }
        if let Some(v) = &self.dump_dir {
            cfg.dump_dir = Some(v.clone());
        }
        if let Some(v) = &self.labels {
            cfg.class_labels = Some(v.clone());
        }
        Ok(cfg)
    }
}
