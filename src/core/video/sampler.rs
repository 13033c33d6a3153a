//! 文件采样器 - seek 游标驱动的关键帧提取
//!
//! 游标从 0 按固定节拍推进到片尾，每个停靠点解码一帧过差分门。
//! 解码/评分/保留在单个停靠点内同步完成，不引入并发 - 帧序是硬不变量。

use log::{debug, info, warn};
use thiserror::Error;

use crate::core::events::{
    CancelToken, EventSink, PipelineEvent, ProgressReporter, Stage, StatsHandle,
};

use super::decoder::FrameDecoder;
use super::diff::DiffScorer;
use super::frame::RetainedFrame;

/// 连续解码失败达到该值视为系统性失败，中止本次运行
const MAX_CONSECUTIVE_DECODE_FAILURES: u32 = 5;

/// 采样参数
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// 采样节拍（秒）
    pub cadence_secs: f64,
    /// 差分阈值，标定器产出后只读
    pub threshold: f32,
    /// 保留帧数硬上限
    pub max_frames: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cadence_secs: 3.0,
            threshold: 25.0,
            max_frames: 256,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// 系统性解码失败（不是孤立跳点）。失败前通过事件下发的帧仍然有效。
    #[error("decoding failed {consecutive} times in a row near {at_secs:.1}s")]
    PervasiveDecodeFailure { at_secs: f64, consecutive: u32 },
}

/// 提取关键帧。保留帧按捕获序下发 `FrameCaptured` 事件并在返回值里
/// 汇总；自然结束（含到达上限提前停止）时恰好发出一次完成事件。
/// 取消时带着已有部分结果干净返回，不再发任何事件。
pub fn extract(
    decoder: &mut dyn FrameDecoder,
    config: &SamplerConfig,
    sink: &dyn EventSink,
    cancel: &CancelToken,
    stats: &StatsHandle,
) -> Result<Vec<RetainedFrame>, ExtractionError> {
    let duration = decoder.duration_secs();
    let mut scorer = DiffScorer::new();
    let mut reporter = ProgressReporter::new(Stage::Extract);
    let mut retained: Vec<RetainedFrame> = Vec::new();
    let mut consecutive_failures = 0u32;
    let mut index = 0u64;
    let mut cursor = 0.0f64;

    info!(
        "extracting frames: duration {:.1}s, cadence {:.1}s, threshold {:.1}, cap {}",
        duration, config.cadence_secs, config.threshold, config.max_frames
    );

    while cursor < duration || cursor == 0.0 {
        if cancel.is_cancelled() {
            debug!("extraction cancelled at {:.1}s, {} frames kept", cursor, retained.len());
            return Ok(retained);
        }

        if retained.len() >= config.max_frames {
            debug!("frame cap {} reached, stopping early", config.max_frames);
            break;
        }

        match decoder.decode_at(cursor, index) {
            Ok(frame) => {
                consecutive_failures = 0;
                stats.record_examined();

                if scorer.should_retain(&frame, config.threshold) {
                    if let Some(kept) = frame.encode_retained() {
                        stats.record_retained();
                        sink.emit(PipelineEvent::FrameCaptured(kept.clone()));
                        retained.push(kept);
                    }
                }
                // 候选帧缓冲在此释放，只有 JPEG 压缩形式留存
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    "decode failed at sample point ({} consecutive): {e}",
                    consecutive_failures
                );

                if consecutive_failures >= MAX_CONSECUTIVE_DECODE_FAILURES {
                    sink.emit(PipelineEvent::Failed {
                        stage: Stage::Extract,
                        message: format!("pervasive decode failure near {cursor:.1}s"),
                    });
                    return Err(ExtractionError::PervasiveDecodeFailure {
                        at_secs: cursor,
                        consecutive: consecutive_failures,
                    });
                }
            }
        }

        index += 1;
        cursor += config.cadence_secs;

        if duration > 0.0 {
            reporter.report(sink, cursor / duration * 100.0);
        }
    }

    reporter.report(sink, 100.0);
    sink.emit(PipelineEvent::Completed(stats.snapshot()));
    info!(
        "extraction complete: {} examined, {} retained",
        stats.snapshot().examined,
        stats.snapshot().retained
    );

    Ok(retained)
}
