//! 捕获源抽象
//!
//! 对接宿主引擎的渲染目标: 发起异步GPU回读,通过可轮询栅栏观察完成。

use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture source is not available")]
    SourceUnavailable,
    #[error("pixel buffer of {got} bytes does not hold a {width}x{height} RGBA frame")]
    BadFrameLength { got: usize, width: u32, height: u32 },
}

/// Dimensions of the last captured frame. Written by the scheduler right
/// before a capture request is issued; tasks receive an immutable copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenImageProperties {
    pub width: u32,
    pub height: u32,
}

/// The network's required input resolution. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelImageProperties {
    pub width: u32,
    pub height: u32,
}

/// Immutable snapshot of one rendered frame: RGBA8, 4 bytes per pixel.
///
/// Produced by a completed GPU readback, consumed by exactly one inference
/// task, then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CapturedFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(CaptureError::BadFrameLength {
                got: pixels.len(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Pollable flag for a previously issued GPU operation.
///
/// Always polled from the tick loop, never waited on: converting this to a
/// blocking wait would break the non-stalling contract of the pipeline.
pub trait CompletionFence: Send {
    fn is_complete(&self) -> bool;
}

/// One in-flight readback: the completion fence paired with the pixel-buffer
/// destination the GPU will fill.
///
/// Queued FIFO by the scheduler and removed only after the fence reports
/// completion.
pub struct PendingReadback {
    destination: Arc<Mutex<Option<CapturedFrame>>>,
    fence: Box<dyn CompletionFence>,
}

impl PendingReadback {
    pub fn new(
        destination: Arc<Mutex<Option<CapturedFrame>>>,
        fence: Box<dyn CompletionFence>,
    ) -> Self {
        Self { destination, fence }
    }

    pub fn is_ready(&self) -> bool {
        self.fence.is_complete()
    }

    /// Take ownership of the frame the readback produced.
    ///
    /// Meaningful only after `is_ready`; the frame transfers to the caller
    /// and the destination is left empty.
    pub fn take_frame(&self) -> Option<CapturedFrame> {
        self.destination
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

/// A renderable target frames can be read back from.
///
/// `request_readback` must enqueue the GPU-side copy and return immediately;
/// completion is observed later through the returned fence.
pub trait CaptureSource {
    /// Whether the underlying render target is currently usable.
    fn is_valid(&self) -> bool;

    /// Current output dimensions of the render target.
    fn dimensions(&self) -> (u32, u32);

    /// Issue a non-blocking readback of the current render target.
    fn request_readback(&mut self) -> Result<PendingReadback, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_buffer_length() {
        let err = CapturedFrame::new(2, 2, vec![0u8; 12]).unwrap_err();
        match err {
            CaptureError::BadFrameLength { got, width, height } => {
                assert_eq!((got, width, height), (12, 2, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn frame_accepts_exact_rgba_length() {
        let frame = CapturedFrame::new(2, 3, vec![7u8; 24]).unwrap();
        assert_eq!(frame.pixel_count(), 6);
        assert_eq!(frame.pixels().len(), 24);
    }
}
