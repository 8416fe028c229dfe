//! 推理引擎能力接口
//!
//! 引擎本体视为黑盒;这里只约定输入/输出边界的数据契约。

use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("neural network is not loaded")]
    NotLoaded,
    #[error("inference backend failure: {0}")]
    Backend(String),
}

/// Flat output of one forward pass plus its shape metadata.
///
/// For the detection models this pipeline targets the logical layout is an
/// `attrs x preds` table stored attribute-major: the value for attribute `a`
/// of prediction `p` lives at `data[a * preds + p]`. The decoder re-derives
/// `attrs`/`preds` from `shape` and validates both.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl OutputTensor {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        Self { data, shape }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Capability interface over an opaque inference engine.
///
/// `run` blocks and is therefore only ever called from inside a background
/// inference task, never from the tick loop. The scheduler's one-task-at-a-
/// time invariant means implementations need no internal locking of their
/// own.
pub trait NeuralNetwork: Send {
    fn is_loaded(&self) -> bool;

    /// Stage the model input: normalized floats, channel-planar layout,
    /// length `3 * model_width * model_height`.
    fn set_input(&mut self, tensor: &[f32]);

    /// Execute the staged input synchronously.
    fn run(&mut self) -> Result<(), NetworkError>;

    /// The output of the most recent `run`, with shape metadata.
    fn output_tensor(&self) -> OutputTensor;
}

/// Network handle shared between the scheduler and its tasks.
pub type SharedNetwork = Arc<Mutex<dyn NeuralNetwork>>;
