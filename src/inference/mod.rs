/// 推理系统 (Inference System)
///
/// 独立工作线程,单槽串行执行:
/// - Network:    推理引擎能力接口 (加载/输入/执行/输出张量)
/// - Preprocess: 缩放 + 归一化 + 通道平面化
/// - Executor:   单槽后台执行器 (工作线程 + 任务句柄)
/// - Task:       一帧的完整推理单元 (转换 → 缩放 → 推理 → 解码)
pub mod executor;
pub mod network;
pub mod preprocess;
pub mod task;

pub use executor::{InferenceExecutor, TaskHandle};
pub use network::{NetworkError, NeuralNetwork, OutputTensor, SharedNetwork};
pub use preprocess::{resize_to_model, ModelInput, PreprocessError};
pub use task::InferenceTask;
