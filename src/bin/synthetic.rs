//! 合成场景流水线演示
//!
//! 用软件捕获源 + 脚本化推理引擎替身驱动完整调度循环:
//! 捕获 → 颜色转换 → 缩放归一化 → "推理" → 解码 → 最新检测槽。
//! 无需宿主引擎或真实模型即可观察流水线行为。

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};

use scenecap_rs::{
    load_class_labels, Args, CaptureScheduler, NetworkError, NeuralNetwork, OutputTensor,
    SharedNetwork, SyntheticCapture,
};

/// Stand-in inference engine.
///
/// Emits a fixed cast of detections in the `[1, 4 + nc, preds]`
/// attribute-major layout; the lead box drifts across the frame per run so
/// the overlay consumer sees movement.
struct ScriptedNetwork {
    num_classes: usize,
    model_width: u32,
    model_height: u32,
    runs: u64,
    staged: usize,
}

impl ScriptedNetwork {
    const PREDS: usize = 300;

    fn new(num_classes: usize, model_width: u32, model_height: u32) -> Self {
        Self {
            num_classes,
            model_width,
            model_height,
            runs: 0,
            staged: 0,
        }
    }
}

impl NeuralNetwork for ScriptedNetwork {
    fn is_loaded(&self) -> bool {
        true
    }

    fn set_input(&mut self, tensor: &[f32]) {
        self.staged = tensor.len();
    }

    fn run(&mut self) -> Result<(), NetworkError> {
        let expected = 3 * self.model_width as usize * self.model_height as usize;
        if self.staged != expected {
            return Err(NetworkError::Backend(format!(
                "staged {} values, expected {expected}",
                self.staged
            )));
        }
        self.runs += 1;
        Ok(())
    }

    fn output_tensor(&self) -> OutputTensor {
        let attrs = 4 + self.num_classes;
        let mut data = vec![0f32; attrs * Self::PREDS];
        if self.num_classes > 0 {
            let w = self.model_width as f32;
            let h = self.model_height as f32;
            let drift = (self.runs % 60) as f32 / 60.0;

            let mut put = |p: usize, cx: f32, cy: f32, bw: f32, bh: f32, id: usize, conf: f32| {
                data[p] = cx;
                data[Self::PREDS + p] = cy;
                data[2 * Self::PREDS + p] = bw;
                data[3 * Self::PREDS + p] = bh;
                data[(4 + id) * Self::PREDS + p] = conf;
            };

            let last = self.num_classes - 1;
            put(
                0,
                w * (0.2 + 0.6 * drift),
                h * 0.5,
                w * 0.18,
                h * 0.55,
                0,
                0.91,
            );
            put(1, w * 0.25, h * 0.25, w * 0.1, h * 0.1, 56.min(last), 0.72);
            // stays below the default threshold on purpose
            put(2, w * 0.8, h * 0.7, w * 0.2, h * 0.2, 16.min(last), 0.40);
        }
        OutputTensor::new(data, vec![1, attrs, Self::PREDS])
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let cfg = args.resolve()?;
    info!(
        "pipeline: {}x{} capture → {}x{} model, conf > {}, capture every {} ticks",
        args.screen_width,
        args.screen_height,
        cfg.model_width,
        cfg.model_height,
        cfg.conf,
        cfg.frame_mod
    );

    let labels = cfg
        .class_labels
        .as_ref()
        .map(load_class_labels)
        .unwrap_or_default();

    let network: SharedNetwork = Arc::new(Mutex::new(ScriptedNetwork::new(
        cfg.num_classes,
        cfg.model_width,
        cfg.model_height,
    )));
    let source = SyntheticCapture::new(args.screen_width, args.screen_height);
    let mut scheduler = CaptureScheduler::new(
        source,
        network,
        cfg.decoder(),
        cfg.model_image(),
        cfg.scheduler(),
    );
    let detections = scheduler.detections();

    for tick in 0..args.ticks {
        scheduler.tick();
        thread::sleep(Duration::from_millis(args.tick_ms));

        if (tick + 1) % 30 == 0 {
            let snap = detections.snapshot();
            let boxes: usize = snap.values().map(Vec::len).sum();
            info!(
                "tick {}: {} classes, {} boxes, {} readbacks pending, {} tasks queued",
                tick + 1,
                snap.len(),
                boxes,
                scheduler.pending_readbacks(),
                scheduler.queued_tasks()
            );
        }
    }

    // stop capturing and let queued work finish
    scheduler.source_mut().invalidate();
    while !scheduler.is_idle() {
        scheduler.tick();
        thread::sleep(Duration::from_millis(args.tick_ms));
    }

    let snap = detections.snapshot();
    let mut classes: Vec<_> = snap.keys().copied().collect();
    classes.sort_unstable();

    info!("final detections ({} classes):", classes.len());
    for class in classes {
        let name = labels
            .get(&class)
            .cloned()
            .unwrap_or_else(|| format!("class {class}"));
        for b in &snap[&class] {
            info!(
                "  {name}: conf={:.2} box=({:.0},{:.0} {:.0}x{:.0})",
                b.confidence(),
                b.x1(),
                b.y1(),
                b.width(),
                b.height()
            );
        }
    }
    Ok(())
}
