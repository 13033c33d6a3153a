//! 自适应差分阈值标定
//!
//! 只预扫描视频开头一小段（标定成本必须远低于完整提取），统计逐帧
//! 差分布后给出单个标量阈值：静态/幻灯片类内容落在下限附近，只留
//! 真正的切换；高运动内容阈值抬高，避免近似重复帧灌满输出。

use log::{debug, warn};
use rayon::prelude::*;

use crate::core::events::CancelToken;

use super::decoder::FrameDecoder;
use super::diff::DiffScorer;
use super::frame::Frame;

/// 预扫描跨度上限（秒）
const CALIBRATION_SPAN_SECS: f64 = 30.0;
/// 预扫描采样步长（秒）
const CALIBRATION_STEP_SECS: f64 = 1.0;
/// 阈值下限 - 静态内容也要能截到真正的切换
const MIN_THRESHOLD: f32 = 8.0;
/// 阈值上限 - 再高会把真实切换也挡掉
const MAX_THRESHOLD: f32 = 80.0;
/// 样本不足时的保底常数
const FALLBACK_THRESHOLD: f32 = 25.0;

/// 标定差分阈值。结果总是有界且非零；退化输入（单帧、超短视频、
/// 解码失败）回退到保底常数，绝不除零。
pub fn calibrate(decoder: &mut dyn FrameDecoder, cancel: &CancelToken) -> f32 {
    let span = decoder.duration_secs().min(CALIBRATION_SPAN_SECS);

    let mut samples: Vec<Frame> = Vec::new();
    let mut cursor = 0.0f64;
    let mut index = 0u64;
    while cursor < span || cursor == 0.0 {
        if cancel.is_cancelled() {
            return FALLBACK_THRESHOLD;
        }

        match decoder.decode_at(cursor, index) {
            Ok(frame) => samples.push(frame),
            Err(e) => warn!("calibration sample skipped: {e}"),
        }

        index += 1;
        cursor += CALIBRATION_STEP_SECS;
    }

    if samples.len() < 2 {
        debug!(
            "calibration span degenerate ({} sample(s)), using fallback threshold {}",
            samples.len(),
            FALLBACK_THRESHOLD
        );
        return FALLBACK_THRESHOLD;
    }

    // 相邻样本两两评分
    let scores: Vec<f32> = samples
        .par_windows(2)
        .map(|pair| DiffScorer::pairwise_score(&pair[0], &pair[1]))
        .collect();

    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
    let variance =
        scores.iter().map(|&s| (s - mean).powi(2)).sum::<f32>() / scores.len() as f32;
    let stddev = variance.sqrt();

    let threshold = (mean + 0.5 * stddev).clamp(MIN_THRESHOLD, MAX_THRESHOLD);
    debug!(
        "calibrated threshold {:.1} from {} samples (mean {:.1}, stddev {:.1})",
        threshold,
        samples.len(),
        mean,
        stddev
    );

    threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::decoder::DecodeError;

    /// 合成解码器：按序号生成纯色帧
    struct SyntheticDecoder {
        duration_secs: f64,
        fill: Box<dyn Fn(u64) -> u8 + Send>,
    }

    impl SyntheticDecoder {
        fn new(duration_secs: f64, fill: impl Fn(u64) -> u8 + Send + 'static) -> Self {
            Self {
                duration_secs,
                fill: Box::new(fill),
            }
        }
    }

    impl FrameDecoder for SyntheticDecoder {
        fn duration_secs(&self) -> f64 {
            self.duration_secs
        }

        fn dimensions(&self) -> (u32, u32) {
            (64, 64)
        }

        fn decode_at(&mut self, at_secs: f64, index: u64) -> Result<Frame, DecodeError> {
            let fill = (self.fill)(index);
            Ok(Frame::new(
                64,
                64,
                vec![fill; 64 * 64 * 4],
                (at_secs * 1000.0) as u64,
                index,
            ))
        }
    }

    #[test]
    fn test_zero_motion_hits_lower_clamp() {
        let mut decoder = SyntheticDecoder::new(20.0, |_| 128);
        let threshold = calibrate(&mut decoder, &CancelToken::new());
        assert_eq!(threshold, MIN_THRESHOLD);
    }

    #[test]
    fn test_max_motion_hits_upper_clamp() {
        // 黑白交替，逐帧差约 255
        let mut decoder = SyntheticDecoder::new(20.0, |i| if i % 2 == 0 { 0 } else { 255 });
        let threshold = calibrate(&mut decoder, &CancelToken::new());
        assert_eq!(threshold, MAX_THRESHOLD);
    }

    #[test]
    fn test_single_frame_video_uses_fallback() {
        let mut decoder = SyntheticDecoder::new(0.0, |_| 50);
        let threshold = calibrate(&mut decoder, &CancelToken::new());
        assert_eq!(threshold, FALLBACK_THRESHOLD);
    }

    #[test]
    fn test_threshold_always_bounded() {
        let mut decoder = SyntheticDecoder::new(15.0, |i| (i * 37 % 256) as u8);
        let threshold = calibrate(&mut decoder, &CancelToken::new());
        assert!(threshold >= MIN_THRESHOLD);
        assert!(threshold <= MAX_THRESHOLD);
    }

    #[test]
    fn test_cancelled_calibration_returns_fallback() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut decoder = SyntheticDecoder::new(20.0, |_| 0);
        assert_eq!(calibrate(&mut decoder, &cancel), FALLBACK_THRESHOLD);
    }
}
