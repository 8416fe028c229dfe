// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 检测输出解码
// 将扁平输出张量按 attrs x preds 预测表解释,提取各类别的边界框

use clap::ValueEnum;
use ndarray::{s, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inference::OutputTensor;
use crate::{Bbox, Detections};

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("output shape {shape:?} does not factor into an attrs x preds table of {len} values")]
    ShapeMismatch { shape: Vec<usize>, len: usize },
    #[error("output has {attrs} attributes per prediction, need at least {needed} for {num_classes} classes")]
    TooFewAttributes {
        attrs: usize,
        needed: usize,
        num_classes: usize,
    },
}

/// Which detections survive a decoding pass. Neither mode applies NMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeMode {
    /// Keep every detection above the confidence threshold, grouped per
    /// class (the richer behavior; default).
    #[default]
    PerClass,
    /// Keep only the single highest-confidence detection across all classes.
    BestOverall,
}

/// Decoder for single-stage detector output.
///
/// The flat tensor is read as an `attrs x preds` table stored attribute-major
/// (value for attribute `a`, prediction `p` at `a * preds + p`, the layout of
/// a `[1, 4 + nc, N]` detector export). Attribute rows 0..4 are cx, cy, w, h
/// in model-input pixel space; rows 4.. hold one confidence per class.
#[derive(Debug, Clone)]
pub struct YoloDecoder {
    conf: f32,
    num_classes: usize,
    mode: DecodeMode,
}

impl YoloDecoder {
    pub fn new(conf: f32, num_classes: usize, mode: DecodeMode) -> Self {
        Self {
            conf,
            num_classes,
            mode,
        }
    }

    pub fn conf(&self) -> f32 {
        self.conf
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Decode one output tensor into a fresh detection map.
    ///
    /// The comparison against the threshold is strict: a confidence exactly
    /// equal to it is excluded.
    pub fn decode(&self, tensor: &OutputTensor) -> Result<Detections, DecodeError> {
        const CXYWH_OFFSET: usize = 4;

        let (attrs, preds) = table_shape(tensor.shape(), tensor.len())?;
        let needed = CXYWH_OFFSET + self.num_classes;
        if attrs < needed {
            return Err(DecodeError::TooFewAttributes {
                attrs,
                needed,
                num_classes: self.num_classes,
            });
        }

        let table = ArrayView2::from_shape((attrs, preds), tensor.data())
            .map_err(|_| DecodeError::ShapeMismatch {
                shape: tensor.shape().to_vec(),
                len: tensor.len(),
            })?;

        let mut detections = Detections::new();
        let mut best: Option<Bbox> = None;

        for pred in table.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + self.num_classes]);

            for (id, &confidence) in clss.iter().enumerate() {
                if confidence <= self.conf {
                    continue;
                }
                let boxed =
                    Bbox::from_cxcywh(bbox[0], bbox[1], bbox[2], bbox[3], id, confidence);
                match self.mode {
                    DecodeMode::PerClass => {
                        detections.entry(id).or_default().push(boxed);
                    }
                    DecodeMode::BestOverall => {
                        if best
                            .as_ref()
                            .map_or(true, |b| confidence > b.confidence())
                        {
                            best = Some(boxed);
                        }
                    }
                }
            }
        }

        if let DecodeMode::BestOverall = self.mode {
            if let Some(b) = best {
                detections.insert(b.id(), vec![b]);
            }
        }

        Ok(detections)
    }
}

// Strip leading batch dimensions of 1 (the `{1, attrs, preds}` export shape)
// and check the remaining table accounts for every value.
fn table_shape(shape: &[usize], len: usize) -> Result<(usize, usize), DecodeError> {
    let mut dims = shape;
    while dims.len() > 2 && dims[0] == 1 {
        dims = &dims[1..];
    }
    match dims {
        [attrs, preds] if attrs * preds == len => Ok((*attrs, *preds)),
        _ => Err(DecodeError::ShapeMismatch {
            shape: shape.to_vec(),
            len,
        }),
    }
}
