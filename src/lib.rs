// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod capture; // 场景捕获与调度系统
pub mod config; // 流水线配置参数
pub mod inference; // 后台推理系统
pub mod models; // 输出张量解码

pub use crate::capture::{
    CaptureError, CaptureScheduler, CaptureSource, CapturedFrame, CompletionFence,
    ModelImageProperties, PendingReadback, ScreenImageProperties, SchedulerConfig,
    SyntheticCapture,
};
pub use crate::config::{Args, PipelineConfig};
pub use crate::inference::{
    InferenceExecutor, InferenceTask, ModelInput, NetworkError, NeuralNetwork, OutputTensor,
    SharedNetwork, TaskHandle,
};
pub use crate::models::{DecodeError, DecodeMode, YoloDecoder};

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Result of one inference pass: bounding boxes grouped by class index.
///
/// Box order within a class follows prediction order in the output tensor.
/// Each pass produces a whole new map; results are never merged across frames.
pub type Detections = HashMap<usize, Vec<Bbox>>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object, in model-input pixel space
    cx: f32,
    cy: f32,
    width: f32,
    height: f32,
    x1: f32,
    y1: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn from_cxcywh(
        cx: f32,
        cy: f32,
        width: f32,
        height: f32,
        id: usize,
        confidence: f32,
    ) -> Self {
        Self {
            cx,
            cy,
            width,
            height,
            x1: cx - width / 2.,
            y1: cy - height / 2.,
            id,
            confidence,
        }
    }

    pub fn cx(&self) -> f32 {
        self.cx
    }

    pub fn cy(&self) -> f32 {
        self.cy
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x1 + self.width
    }

    pub fn y2(&self) -> f32 {
        self.y1 + self.height
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Last-writer-wins slot for the most recent detection map.
///
/// Written by the background inference task, read by the overlay consumer.
/// Snapshots are internally consistent (lock-guarded), but there is no
/// ordering guarantee across tasks beyond the scheduler's one-at-a-time
/// dispatch.
#[derive(Clone, Default)]
pub struct SharedDetections {
    inner: Arc<RwLock<Detections>>,
}

impl SharedDetections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the previous result entirely.
    pub fn publish(&self, detections: Detections) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = detections;
    }

    /// Clone of the most recent detection map.
    pub fn snapshot(&self) -> Detections {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Load a class-label table from a text file with one `index:label` pair per
/// line.
///
/// A missing or unreadable file yields an empty map, not an error; malformed
/// lines are skipped.
pub fn load_class_labels<P: AsRef<Path>>(path: P) -> HashMap<usize, String> {
    let mut labels = HashMap::new();
    let Ok(content) = std::fs::read_to_string(path) else {
        return labels;
    };
    for line in content.lines() {
        let mut parts = line.splitn(2, ':');
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        if let Ok(index) = key.trim().parse::<usize>() {
            let value = value.trim();
            if !value.is_empty() {
                labels.insert(index, value.to_string());
            }
        }
    }
    labels
}

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
