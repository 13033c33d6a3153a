//! 视频转幻灯片管线 - 文件路径
//!
//! 诊断 → 规范化（已是 MP4 则跳过）→ 阈值标定 → 关键帧提取。
//! 单次运行严格串行，阶段之间不并发。

use log::{info, warn};
use thiserror::Error;

use crate::core::diagnostics::{self, FormatProfile, MediaSource};
use crate::core::events::{CancelToken, CaptureStats, EventSink, StatsHandle};
use crate::core::transcode::{TranscodeConfig, TranscodeError, Transcoder};
use crate::core::video::{
    calibrate, extract, ExtractionError, FfmpegFrameDecoder, RetainedFrame, SamplerConfig,
};

/// 管线选项
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// 采样节拍（秒）
    pub cadence_secs: f64,
    /// 保留帧数硬上限
    pub max_frames: usize,
    /// 跳过标定、强制使用指定阈值
    pub threshold_override: Option<f32>,
    pub transcode: TranscodeConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            cadence_secs: 3.0,
            max_frames: 256,
            threshold_override: None,
            transcode: TranscodeConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// 视频管线会话
///
/// 每个会话独占自己的统计与帧序列，多个会话并行互不污染。
pub struct VideoPipeline {
    options: PipelineOptions,
    transcoder: Transcoder,
    stats: StatsHandle,
}

impl VideoPipeline {
    pub fn create() -> Self {
        info!("🎬 VideoPipeline: created");
        Self::with_options(PipelineOptions::default())
    }

    pub fn with_options(options: PipelineOptions) -> Self {
        let transcoder = Transcoder::with_config(options.transcode.clone());
        Self {
            options,
            transcoder,
            stats: StatsHandle::new(),
        }
    }

    /// 诊断直通，供协作 UI 在提交前预检文件
    pub fn inspect_source(&self, source: &MediaSource) -> FormatProfile {
        diagnostics::inspect(source)
    }

    /// 诊断报告文本（排障展示用）
    pub fn diagnostic_report(&self, source: &MediaSource) -> String {
        let profile = diagnostics::inspect(source);
        diagnostics::diagnostic_report(source, &profile)
    }

    /// 端到端处理一个输入视频，返回按捕获序排列的保留帧。
    /// 进度与帧捕获事件实时走 sink；提取阶段系统性失败时，
    /// 失败前已下发的帧仍然有效。
    pub fn process(
        &self,
        source: &MediaSource,
        sink: &dyn EventSink,
        cancel: &CancelToken,
    ) -> Result<Vec<RetainedFrame>, PipelineError> {
        self.stats.reset();

        let profile = diagnostics::inspect(source);
        info!(
            "processing \"{}\": {} ({} bytes)",
            source.file_name,
            profile.family.label(),
            source.byte_size()
        );

        let video = self.transcoder.normalize(source, sink, cancel)?;
        let mut decoder = FfmpegFrameDecoder::open(&self.options.transcode, &video);

        let threshold = match self.options.threshold_override {
            Some(fixed) => {
                warn!("threshold calibration skipped, using override {fixed:.1}");
                fixed
            }
            None => calibrate(&mut decoder, cancel),
        };
        info!("using dynamic threshold: {threshold:.1}");

        let config = SamplerConfig {
            cadence_secs: self.options.cadence_secs,
            threshold,
            max_frames: self.options.max_frames,
        };

        let frames = extract(&mut decoder, &config, sink, cancel, &self.stats)?;
        Ok(frames)
        // CanonicalVideo 在此丢弃，底层临时文件随之删除
    }

    /// 获取运行统计
    pub fn stats(&self) -> CaptureStats {
        self.stats.snapshot()
    }
}

impl Drop for VideoPipeline {
    fn drop(&mut self) {
        info!("🗑️ VideoPipeline: released");
    }
}
