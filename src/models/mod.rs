/// 模型输出解码
///
/// ## 后处理器模式 (Postprocessor Pattern)
/// 推理引擎是黑盒;这里只解释它的输出张量。
/// - **YoloDecoder**: 单阶段检测器的预测表解码
///   - 逐预测列提取几何 (cx, cy, w, h)
///   - 逐类别置信度过滤 (严格大于阈值)
///   - 文件: `yolo.rs`
///
/// 不做非极大值抑制,同类的重叠框全部保留。
pub mod yolo;

pub use yolo::{DecodeError, DecodeMode, YoloDecoder};
