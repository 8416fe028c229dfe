//! 推理任务
//!
//! 一帧的完整后台推理单元。构造时拷贝全部输入,
//! 此后与调度器不共享任何可变状态 — 隔离保证线程安全,而非加锁。

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error};

use crate::capture::{convert, CapturedFrame, ModelImageProperties, ScreenImageProperties};
use crate::inference::network::{NetworkError, SharedNetwork};
use crate::inference::preprocess::{self, PreprocessError};
use crate::models::{DecodeError, YoloDecoder};
use crate::{Detections, SharedDetections};

#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// One captured frame bundled with everything needed to turn it into
/// detections: convert → resize → run network → decode → publish.
pub struct InferenceTask {
    frame: CapturedFrame,
    screen: ScreenImageProperties,
    model_image: ModelImageProperties,
    network: SharedNetwork,
    decoder: YoloDecoder,
    output: SharedDetections,
}

impl InferenceTask {
    pub fn new(
        frame: CapturedFrame,
        screen: ScreenImageProperties,
        model_image: ModelImageProperties,
        network: SharedNetwork,
        decoder: YoloDecoder,
        output: SharedDetections,
    ) -> Self {
        Self {
            frame,
            screen,
            model_image,
            network,
            decoder,
            output,
        }
    }

    /// Run the whole pass and publish the result.
    ///
    /// Never panics across the background-task boundary: any failure is
    /// logged and published as an empty detection map, fully replacing the
    /// previous result.
    pub fn execute(self) {
        let started = Instant::now();
        match self.infer() {
            Ok(detections) => {
                debug!(
                    elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                    classes = detections.len(),
                    "inference pass complete"
                );
                self.output.publish(detections);
            }
            Err(err) => {
                error!("inference task failed: {err}");
                self.output.publish(Detections::new());
            }
        }
    }

    fn infer(&self) -> Result<Detections, TaskError> {
        let t_pre = Instant::now();
        let rgb = convert::frame_to_rgb(&self.frame);
        let input = preprocess::resize_to_model(&rgb, self.screen, self.model_image)?;
        debug!("preprocess: {:?}", t_pre.elapsed());

        let t_run = Instant::now();
        let tensor = {
            let mut network = self.network.lock().unwrap_or_else(|e| e.into_inner());
            if !network.is_loaded() {
                return Err(NetworkError::NotLoaded.into());
            }
            network.set_input(input.data());
            network.run()?;
            network.output_tensor()
        };
        debug!("inference: {:?}", t_run.elapsed());

        let t_post = Instant::now();
        let detections = self.decoder.decode(&tensor)?;
        debug!("decode: {:?}", t_post.elapsed());
        Ok(detections)
    }
}
