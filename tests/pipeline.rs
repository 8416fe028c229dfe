//! 流水线集成测试
//!
//! 覆盖调度器跨tick的行为: 抽帧节流、栅栏FIFO、单任务并发不变量、
//! 端到端的捕获→推理→发布链路。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use scenecap_rs::{
    capture::convert, inference::preprocess, CaptureScheduler, CaptureSource, DecodeMode,
    ModelImageProperties, NetworkError, NeuralNetwork, OutputTensor, SchedulerConfig,
    ScreenImageProperties, SharedNetwork, SyntheticCapture, YoloDecoder,
};

const SCREEN_W: u32 = 32;
const SCREEN_H: u32 = 24;
const MODEL_W: u32 = 16;
const MODEL_H: u32 = 12;

/// Records a fingerprint of every staged input and answers with one
/// above-threshold detection per pass.
struct RecordingNetwork {
    fingerprints: Arc<Mutex<Vec<f32>>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
    run_delay: Duration,
    staged: f32,
}

impl RecordingNetwork {
    fn shared(run_delay: Duration) -> (SharedNetwork, Arc<Mutex<Vec<f32>>>, Arc<AtomicUsize>) {
        let fingerprints = Arc::new(Mutex::new(Vec::new()));
        let max_running = Arc::new(AtomicUsize::new(0));
        let network: SharedNetwork = Arc::new(Mutex::new(RecordingNetwork {
            fingerprints: fingerprints.clone(),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: max_running.clone(),
            run_delay,
            staged: 0.0,
        }));
        (network, fingerprints, max_running)
    }
}

impl NeuralNetwork for RecordingNetwork {
    fn is_loaded(&self) -> bool {
        true
    }

    fn set_input(&mut self, tensor: &[f32]) {
        self.staged = tensor.iter().sum();
    }

    fn run(&mut self) -> Result<(), NetworkError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if !self.run_delay.is_zero() {
            thread::sleep(self.run_delay);
        }
        self.fingerprints
            .lock()
            .unwrap()
            .push(self.staged);
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn output_tensor(&self) -> OutputTensor {
        // one 6-attribute prediction, class 0 above any sane threshold
        OutputTensor::new(vec![8.0, 6.0, 4.0, 4.0, 0.95, 0.0], vec![1, 6, 1])
    }
}

fn scheduler_with(
    source: SyntheticCapture,
    network: SharedNetwork,
    config: SchedulerConfig,
) -> CaptureScheduler<SyntheticCapture> {
    CaptureScheduler::new(
        source,
        network,
        YoloDecoder::new(0.65, 2, DecodeMode::PerClass),
        ModelImageProperties {
            width: MODEL_W,
            height: MODEL_H,
        },
        config,
    )
}

fn drain(scheduler: &mut CaptureScheduler<SyntheticCapture>) {
    scheduler.source_mut().invalidate();
    let deadline = Instant::now() + Duration::from_secs(10);
    while !scheduler.is_idle() {
        scheduler.tick();
        thread::sleep(Duration::from_millis(1));
        assert!(Instant::now() < deadline, "pipeline never drained");
    }
}

/// The fingerprint the pipeline should stage for the n-th captured frame,
/// reproduced through the same conversion and preprocessing stages.
fn expected_fingerprints(count: usize) -> Vec<f32> {
    let mut twin = SyntheticCapture::new(SCREEN_W, SCREEN_H);
    let screen = ScreenImageProperties {
        width: SCREEN_W,
        height: SCREEN_H,
    };
    let model = ModelImageProperties {
        width: MODEL_W,
        height: MODEL_H,
    };
    (0..count)
        .map(|_| {
            let frame = twin
                .request_readback()
                .unwrap()
                .take_frame()
                .unwrap();
            let rgb = convert::frame_to_rgb(&frame);
            preprocess::resize_to_model(&rgb, screen, model)
                .unwrap()
                .data()
                .iter()
                .sum()
        })
        .collect()
}

#[test]
fn five_ticks_issue_exactly_one_capture_then_one_task() {
    let source = SyntheticCapture::with_manual_fences(SCREEN_W, SCREEN_H);
    let (network, _, _) = RecordingNetwork::shared(Duration::ZERO);
    let mut scheduler = scheduler_with(source, network, SchedulerConfig::default());

    for _ in 0..5 {
        scheduler.tick();
    }
    assert_eq!(scheduler.pending_readbacks(), 1);
    assert_eq!(scheduler.queued_tasks(), 0);
    assert!(!scheduler.task_in_flight());

    // the fence completes; the next tick converts it into exactly one task
    scheduler.source_mut().signal_next();
    scheduler.tick();
    assert_eq!(scheduler.pending_readbacks(), 0);
    assert_eq!(scheduler.queued_tasks(), 1);

    drain(&mut scheduler);
}

#[test]
fn readbacks_become_tasks_in_issue_order() {
    let source = SyntheticCapture::with_manual_fences(SCREEN_W, SCREEN_H);
    let (network, fingerprints, _) = RecordingNetwork::shared(Duration::ZERO);
    let mut scheduler = scheduler_with(
        source,
        network,
        SchedulerConfig {
            frame_mod: 1,
            max_backlog: None,
            dump_dir: None,
        },
    );

    // issue three captures, then let all three fences complete
    for _ in 0..3 {
        scheduler.tick();
    }
    assert_eq!(scheduler.pending_readbacks(), 3);
    for _ in 0..3 {
        scheduler.source_mut().signal_next();
    }

    drain(&mut scheduler);

    let recorded = fingerprints.lock().unwrap().clone();
    let expected = expected_fingerprints(3);
    assert_eq!(recorded, expected, "frames must be inferred in FIFO order");
}

#[test]
fn at_most_one_inference_task_runs_concurrently() {
    let source = SyntheticCapture::new(SCREEN_W, SCREEN_H);
    let (network, fingerprints, max_running) =
        RecordingNetwork::shared(Duration::from_millis(5));
    let mut scheduler = scheduler_with(
        source,
        network,
        SchedulerConfig {
            frame_mod: 1,
            max_backlog: Some(4),
            dump_dir: None,
        },
    );

    for _ in 0..40 {
        scheduler.tick();
        thread::sleep(Duration::from_millis(1));
    }
    drain(&mut scheduler);

    assert!(
        fingerprints.lock().unwrap().len() >= 2,
        "several passes should have run"
    );
    assert_eq!(
        max_running.load(Ordering::SeqCst),
        1,
        "never more than one task in flight"
    );
}

#[test]
fn completed_pipeline_publishes_the_decoded_result() {
    let source = SyntheticCapture::new(SCREEN_W, SCREEN_H);
    let (network, _, _) = RecordingNetwork::shared(Duration::ZERO);
    let mut scheduler = scheduler_with(source, network, SchedulerConfig::default());
    let detections = scheduler.detections();

    for _ in 0..6 {
        scheduler.tick();
        thread::sleep(Duration::from_millis(1));
    }
    drain(&mut scheduler);

    let snap = detections.snapshot();
    assert_eq!(snap.len(), 1);
    let boxes = &snap[&0];
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].cx(), 8.0);
    assert_eq!(boxes[0].x1(), 6.0);
    assert_eq!(boxes[0].confidence(), 0.95);
}

#[test]
fn backlog_stays_bounded_while_inference_lags() {
    let source = SyntheticCapture::new(SCREEN_W, SCREEN_H);
    let (network, _, _) = RecordingNetwork::shared(Duration::from_millis(20));
    let mut scheduler = scheduler_with(
        source,
        network,
        SchedulerConfig {
            frame_mod: 1,
            max_backlog: Some(2),
            dump_dir: None,
        },
    );

    for _ in 0..30 {
        scheduler.tick();
        assert!(scheduler.queued_tasks() <= 2);
    }
    drain(&mut scheduler);
}
