/// 场景捕获系统 (Scene Capture System)
///
/// 每帧由渲染线程驱动,全程非阻塞:
/// - Source:    捕获源抽象 (异步GPU回读 + 完成栅栏)
/// - Convert:   RGBA像素缓冲 → 紧凑RGB字节
/// - Scheduler: 捕获节流、栅栏轮询、推理任务分发
/// - Synthetic: 软件捕获源 (演示与测试)
pub mod convert;
pub mod scheduler;
pub mod source;
pub mod synthetic;

pub use convert::rgba_to_rgb;
pub use scheduler::{CaptureScheduler, SchedulerConfig};
pub use source::{
    CaptureError, CaptureSource, CapturedFrame, CompletionFence, ModelImageProperties,
    PendingReadback, ScreenImageProperties,
};
pub use synthetic::{FenceControl, ManualFence, SyntheticCapture};
