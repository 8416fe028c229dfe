//! 输入预处理
//!
//! 捕获分辨率的RGB字节 → 模型分辨率的归一化平面张量。
//! 纯拉伸缩放,不做letterbox,与直接宽高拉伸的形变一致。

use fast_image_resize as fr;
use thiserror::Error;

use crate::capture::{ModelImageProperties, ScreenImageProperties};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("rgb buffer of {got} bytes does not hold a {width}x{height} frame")]
    BadInputLength { got: usize, width: u32, height: u32 },
    #[error("resize failed: {0}")]
    Resize(String),
}

/// Normalized model input: channel-planar floats in [0, 1].
///
/// Length is always exactly `3 * width * height`; all red values first, then
/// all green, then all blue. Built fresh per inference task and discarded
/// after the network call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl ModelInput {
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Resize an interleaved RGB byte buffer to the model resolution and repack
/// it as a normalized channel-planar tensor.
///
/// The resulting layout satisfies, for channel `c` and pixel index `p`:
/// `planar[c * w * h + p] == resized_interleaved[p * 3 + c] / 255.0`.
pub fn resize_to_model(
    rgb: &[u8],
    screen: ScreenImageProperties,
    model: ModelImageProperties,
) -> Result<ModelInput, PreprocessError> {
    let expected = screen.width as usize * screen.height as usize * 3;
    if rgb.len() != expected {
        return Err(PreprocessError::BadInputLength {
            got: rgb.len(),
            width: screen.width,
            height: screen.height,
        });
    }

    let src = fr::images::ImageRef::new(screen.width, screen.height, rgb, fr::PixelType::U8x3)
        .map_err(|e| PreprocessError::Resize(e.to_string()))?;
    let mut dst = fr::images::Image::new(model.width, model.height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    resizer
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| PreprocessError::Resize(e.to_string()))?;

    let resized = dst.buffer();

    // interleaved u8 → planar f32: one contiguous plane per channel
    let plane = model.width as usize * model.height as usize;
    let mut data = vec![0f32; 3 * plane];
    for p in 0..plane {
        data[p] = resized[p * 3] as f32 / 255.0;
        data[plane + p] = resized[p * 3 + 1] as f32 / 255.0;
        data[2 * plane + p] = resized[p * 3 + 2] as f32 / 255.0;
    }

    Ok(ModelInput {
        data,
        width: model.width,
        height: model.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(width: u32, height: u32) -> ScreenImageProperties {
        ScreenImageProperties { width, height }
    }

    fn model(width: u32, height: u32) -> ModelImageProperties {
        ModelImageProperties { width, height }
    }

    #[test]
    fn same_size_input_keeps_planar_identity() {
        // 2x2 RGB, distinct value per byte
        let rgb: Vec<u8> = (0..12).map(|i| (i * 20) as u8).collect();
        let input = resize_to_model(&rgb, screen(2, 2), model(2, 2)).unwrap();

        assert_eq!(input.len(), 12);
        let plane = 4;
        for p in 0..plane {
            for c in 0..3 {
                assert_eq!(
                    input.data()[c * plane + p],
                    rgb[p * 3 + c] as f32 / 255.0,
                    "channel {c} pixel {p}"
                );
            }
        }
    }

    #[test]
    fn output_length_and_range_hold_under_resize() {
        let (w, h) = (8usize, 6usize);
        let rgb: Vec<u8> = (0..w * h * 3).map(|i| (i % 256) as u8).collect();
        let input = resize_to_model(&rgb, screen(w as u32, h as u32), model(4, 3)).unwrap();

        assert_eq!(input.len(), 3 * 4 * 3);
        assert!(input
            .data()
            .iter()
            .all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn uniform_image_stays_uniform_after_resize() {
        let rgb = vec![102u8; 10 * 10 * 3];
        let input = resize_to_model(&rgb, screen(10, 10), model(4, 4)).unwrap();
        for &v in input.data() {
            assert!((v - 102.0 / 255.0).abs() < 1e-3);
        }
    }

    #[test]
    fn wrong_length_is_rejected() {
        let rgb = vec![0u8; 11];
        assert!(matches!(
            resize_to_model(&rgb, screen(2, 2), model(2, 2)),
            Err(PreprocessError::BadInputLength { got: 11, .. })
        ));
    }
}
