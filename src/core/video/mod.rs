//! 视频帧采样 - 从可寻址视频或直播流中提取"值得做成幻灯片"的帧
//!
//! 核心策略：
//! 1. 阈值标定 - 预扫描开头片段，按运动量自适应调阈值
//! 2. 差分门 - 候选帧只与上一张保留帧比较，降采样灰度平均绝对差
//! 3. 双驱动 - 文件走 seek 游标，录屏走墙钟定时器，评分逻辑共用
//! 4. 有界内存 - 候选帧评完即弃，只留 JPEG 压缩形式

pub mod calibrator;
pub mod decoder;
pub mod diff;
pub mod frame;
pub mod live;
pub mod sampler;

pub use calibrator::calibrate;
pub use decoder::{DecodeError, FfmpegFrameDecoder, FrameDecoder};
pub use diff::DiffScorer;
pub use frame::{Frame, RetainedFrame};
pub use live::{LiveCaptureConfig, LiveFrameSource};
pub use sampler::{extract, ExtractionError, SamplerConfig};
