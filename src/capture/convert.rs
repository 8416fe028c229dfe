//! 颜色格式转换
//!
//! RGBA8 → 紧凑RGB,丢弃alpha通道。逐像素独立,无跨像素依赖。

use super::source::CapturedFrame;

/// Pack a 4-component RGBA8 pixel buffer into interleaved RGB bytes.
///
/// Output length is exactly `3 * N` for `N` input pixels; byte order per
/// pixel stays R, G, B.
pub fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for pixel in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&pixel[..3]);
    }
    rgb
}

/// Frame-level wrapper around [`rgba_to_rgb`].
pub fn frame_to_rgb(frame: &CapturedFrame) -> Vec<u8> {
    rgba_to_rgb(frame.pixels())
}
