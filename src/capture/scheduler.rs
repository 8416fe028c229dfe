//! 捕获调度器
//!
//! 由渲染线程逐tick驱动,三步走,全程不阻塞:
//! 1. 推理槽空闲时分发下一个排队任务
//! 2. 帧率抽取: 每 frame_mod 个tick发起一次捕获
//! 3. 轮询最旧回读的栅栏,完成则转为推理任务入队

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::capture::source::{
    CaptureSource, CapturedFrame, ModelImageProperties, PendingReadback, ScreenImageProperties,
};
use crate::gen_time_string;
use crate::inference::{InferenceExecutor, InferenceTask, SharedNetwork, TaskHandle};
use crate::models::YoloDecoder;
use crate::SharedDetections;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Issue one capture request every this many ticks.
    pub frame_mod: u64,
    /// Cap on queued-but-not-started inference tasks; the oldest is dropped
    /// when a new task would exceed it. `None` restores unbounded queueing.
    pub max_backlog: Option<usize>,
    /// When set, every captured frame is also written to this directory as a
    /// timestamped PNG.
    pub dump_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_mod: 5,
            max_backlog: Some(8),
            dump_dir: None,
        }
    }
}

/// Orchestrates capture timing and hand-off to background inference.
///
/// Owns the FIFO readback queue, the FIFO task queue and the single-slot
/// executor; at most one inference task runs at any moment, queued tasks
/// accumulate up to `max_backlog`.
pub struct CaptureScheduler<S: CaptureSource> {
    source: S,
    network: SharedNetwork,
    decoder: YoloDecoder,
    model_image: ModelImageProperties,
    config: SchedulerConfig,

    executor: InferenceExecutor,
    readback_queue: VecDeque<PendingReadback>,
    task_queue: VecDeque<InferenceTask>,
    current_task: Option<TaskHandle>,
    screen: ScreenImageProperties,
    frame_count: u64,
    detections: SharedDetections,
}

impl<S: CaptureSource> CaptureScheduler<S> {
    pub fn new(
        source: S,
        network: SharedNetwork,
        decoder: YoloDecoder,
        model_image: ModelImageProperties,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            source,
            network,
            decoder,
            model_image,
            config,
            executor: InferenceExecutor::new(),
            readback_queue: VecDeque::new(),
            task_queue: VecDeque::new(),
            current_task: None,
            screen: ScreenImageProperties::default(),
            frame_count: 0,
            detections: SharedDetections::new(),
        }
    }

    /// Advance the pipeline by one frame. Called from the render thread;
    /// never blocks on the GPU, the worker thread or the network.
    pub fn tick(&mut self) {
        self.dispatch_next_task();

        self.frame_count += 1;
        if self.frame_count % self.config.frame_mod == 0 {
            self.capture_color_non_blocking();
            // reset so the counter cannot overflow
            self.frame_count = 0;
        }

        self.poll_oldest_readback();
    }

    /// Handle to the last-writer-wins detection slot the overlay reads.
    pub fn detections(&self) -> SharedDetections {
        self.detections.clone()
    }

    pub fn screen_properties(&self) -> ScreenImageProperties {
        self.screen
    }

    pub fn pending_readbacks(&self) -> usize {
        self.readback_queue.len()
    }

    pub fn queued_tasks(&self) -> usize {
        self.task_queue.len()
    }

    /// Whether an inference task is running right now.
    pub fn task_in_flight(&self) -> bool {
        self.current_task
            .as_ref()
            .map_or(false, |task| !task.is_done())
    }

    /// True once every queue is empty and the inference slot is free.
    pub fn is_idle(&self) -> bool {
        self.readback_queue.is_empty() && self.task_queue.is_empty() && !self.task_in_flight()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    // Step 1: hand the oldest queued task to the worker when the single slot
    // is free. Replacing the previous handle releases that task's resources.
    fn dispatch_next_task(&mut self) {
        if self.task_queue.is_empty() {
            return;
        }
        let slot_free = self
            .current_task
            .as_ref()
            .map_or(true, TaskHandle::is_done);
        if !slot_free {
            return;
        }
        if let Some(task) = self.task_queue.pop_front() {
            self.current_task = Some(self.executor.submit(move || task.execute()));
        }
    }

    // Step 2: enqueue a GPU readback of the current render target and return
    // without waiting. Completion is observed later via the fence.
    fn capture_color_non_blocking(&mut self) {
        if !self.source.is_valid() {
            warn!("capture source was not valid, skipping capture this tick");
            return;
        }

        let (width, height) = self.source.dimensions();
        self.screen = ScreenImageProperties { width, height };

        match self.source.request_readback() {
            Ok(request) => self.readback_queue.push_back(request),
            Err(err) => warn!("readback request failed: {err}"),
        }
    }

    // Step 3: peek (do not pop) the oldest readback; only when its fence
    // reports done is it popped and wrapped into an inference task. FIFO
    // order is preserved and only one readback is inspected per tick.
    fn poll_oldest_readback(&mut self) {
        let ready = self
            .readback_queue
            .front()
            .map_or(false, PendingReadback::is_ready);
        if !ready {
            return;
        }
        let Some(request) = self.readback_queue.pop_front() else {
            return;
        };

        match request.take_frame() {
            Some(frame) => {
                if let Some(dir) = self.config.dump_dir.clone() {
                    dump_frame(&dir, &frame);
                }
                let task = InferenceTask::new(
                    frame,
                    self.screen,
                    self.model_image,
                    self.network.clone(),
                    self.decoder.clone(),
                    self.detections.clone(),
                );
                self.task_queue.push_back(task);
                self.enforce_backlog_cap();
            }
            None => warn!("readback fence signalled but produced no pixel data"),
        }
    }

    fn enforce_backlog_cap(&mut self) {
        let Some(cap) = self.config.max_backlog else {
            return;
        };
        while self.task_queue.len() > cap.max(1) {
            self.task_queue.pop_front();
            warn!(cap, "inference backlog over cap, dropping oldest frame");
        }
    }
}

fn dump_frame(dir: &Path, frame: &CapturedFrame) {
    let Some(img) =
        image::RgbaImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
    else {
        warn!("frame dump skipped: buffer did not form an image");
        return;
    };
    let path = dir.join(format!("frame_{}.png", gen_time_string("-")));
    match img.save(&path) {
        Ok(()) => debug!("dumped frame to {}", path.display()),
        Err(err) => warn!("frame dump to {} failed: {err}", path.display()),
    }
}
