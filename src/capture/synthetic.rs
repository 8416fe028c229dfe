//! 软件捕获源
//!
//! 用过程化渲染的帧模拟引擎渲染目标,供演示程序与测试使用。
//! 栅栏可立即完成,或由调用方手动触发以复现GPU回读的异步时序。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::source::{CaptureError, CaptureSource, CapturedFrame, CompletionFence, PendingReadback};

/// Fence completed by its matching [`FenceControl`].
pub struct ManualFence {
    flag: Arc<AtomicBool>,
}

impl CompletionFence for ManualFence {
    fn is_complete(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Caller-side handle that signals one [`ManualFence`].
pub struct FenceControl {
    flag: Arc<AtomicBool>,
}

impl FenceControl {
    pub fn signal(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_signalled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// A fence/control pair sharing one completion flag.
pub fn manual_fence() -> (ManualFence, FenceControl) {
    let flag = Arc::new(AtomicBool::new(false));
    (
        ManualFence { flag: flag.clone() },
        FenceControl { flag },
    )
}

/// Software stand-in for an engine render target.
///
/// Frames are rendered procedurally on the CPU and differ per frame index,
/// so tests can tell captures apart. In auto mode every fence completes
/// immediately; in manual mode fences complete only through
/// [`SyntheticCapture::signal_next`], oldest first.
pub struct SyntheticCapture {
    width: u32,
    height: u32,
    frame_index: u64,
    auto_signal: bool,
    valid: bool,
    pending: VecDeque<FenceControl>,
}

impl SyntheticCapture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
            auto_signal: true,
            valid: true,
            pending: VecDeque::new(),
        }
    }

    pub fn with_manual_fences(width: u32, height: u32) -> Self {
        Self {
            auto_signal: false,
            ..Self::new(width, height)
        }
    }

    /// Drop into the "render target gone" state; further captures are
    /// refused until `revalidate`.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn revalidate(&mut self) {
        self.valid = true;
    }

    /// Complete the oldest outstanding readback. Returns false when none is
    /// pending.
    pub fn signal_next(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(control) => {
                control.signal();
                true
            }
            None => false,
        }
    }

    pub fn outstanding_fences(&self) -> usize {
        self.pending.len()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frame_index
    }

    // Horizontal/vertical gradient with a bright band that advances with the
    // frame index, so consecutive frames have distinct pixel content.
    fn render_frame(&self) -> CapturedFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut pixels = Vec::with_capacity(w * h * 4);
        for y in 0..h {
            for x in 0..w {
                let band = (x as u64 + self.frame_index * 7) % self.width.max(1) as u64;
                let r = (x * 255 / w.max(1)) as u8;
                let g = (y * 255 / h.max(1)) as u8;
                let b = if band < 8 { 255 } else { 32 };
                pixels.extend_from_slice(&[r, g, b, 255]);
            }
        }
        CapturedFrame::new(self.width, self.height, pixels)
            .unwrap_or_else(|_| unreachable!("buffer sized from own dimensions"))
    }
}

impl CaptureSource for SyntheticCapture {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn request_readback(&mut self) -> Result<PendingReadback, CaptureError> {
        if !self.valid {
            return Err(CaptureError::SourceUnavailable);
        }
        let frame = self.render_frame();
        self.frame_index += 1;

        let destination = Arc::new(Mutex::new(Some(frame)));
        let (fence, control) = manual_fence();
        if self.auto_signal {
            control.signal();
        } else {
            self.pending.push_back(control);
        }
        Ok(PendingReadback::new(destination, Box::new(fence)))
    }
}
