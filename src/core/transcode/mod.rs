//! 视频规范化 - 任意输入容器转为可逐帧寻址的 MP4
//!
//! 两级策略：先尝试流复制（快、无损），确认失败后才重编码。
//! 顺序是本模块的核心性能约定，不能颠倒。

pub mod converter;
pub mod probe;

use thiserror::Error;

pub use converter::{CanonicalVideo, ConvertBackend, FfmpegBackend, TranscodeConfig, Transcoder};
pub use probe::VideoMetadata;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("unsupported video format: {format}")]
    Unsupported {
        format: String,
        remediation: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("probe failed: {0}")]
    Probe(String),

    /// 单级策略失败（内部态，最终会折叠进 ConversionFailed）
    #[error("{strategy} failed: {detail}")]
    StrategyFailed {
        strategy: &'static str,
        detail: String,
    },

    #[error("conversion of {format} failed: {detail}")]
    ConversionFailed {
        format: String,
        detail: String,
        remediation: Vec<String>,
    },

    #[error("conversion cancelled")]
    Cancelled,
}
