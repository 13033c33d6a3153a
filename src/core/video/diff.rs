//! 帧差评分 - 降采样灰度平均绝对差
//!
//! 指标：先把帧缩到 64x64，按 BT.601 整数权重转灰度，再与基准帧逐像素
//! 求平均绝对差，得分范围 [0, 255]。
//!
//! 两条采样路径（文件 seek 驱动 / 录屏定时驱动）共用这一个评分器。
//! 基准永远是上一张**保留**帧而不是上一张检查帧，否则慢速连续运动会
//! 让每一步的差值都低于阈值、永远触发不了保留。

use super::frame::Frame;

/// 差分评分器 - 单次运行独占，基准帧不跨运行共享
pub struct DiffScorer {
    sample_size: (u32, u32),
    last_retained: Option<Vec<u8>>,
}

impl DiffScorer {
    pub fn new() -> Self {
        Self {
            sample_size: (64, 64),
            last_retained: None,
        }
    }

    /// 差分门判定：得分 ≥ 阈值或首帧则保留，保留的同时提交为新基准
    pub fn should_retain(&mut self, frame: &Frame, threshold: f32) -> bool {
        let gray = self.downsample_gray(frame);

        let retain = match &self.last_retained {
            Some(last) => Self::mean_abs_diff(last, &gray) >= threshold,
            None => true,
        };

        if retain {
            self.last_retained = Some(gray);
        }

        retain
    }

    /// 两帧之间的原始差分得分（标定器用，不涉及基准状态）
    pub fn pairwise_score(a: &Frame, b: &Frame) -> f32 {
        let scorer = DiffScorer::new();
        let ga = scorer.downsample_gray(a);
        let gb = scorer.downsample_gray(b);
        Self::mean_abs_diff(&ga, &gb)
    }

    pub fn reset(&mut self) {
        self.last_retained = None;
    }

    fn downsample_gray(&self, frame: &Frame) -> Vec<u8> {
        let resized = frame.resize_to(self.sample_size.0, self.sample_size.1);
        resized
            .data
            .chunks_exact(4)
            .map(|rgba| {
                ((rgba[0] as u32 * 299 + rgba[1] as u32 * 587 + rgba[2] as u32 * 114) / 1000) as u8
            })
            .collect()
    }

    fn mean_abs_diff(a: &[u8], b: &[u8]) -> f32 {
        if a.is_empty() || a.len() != b.len() {
            // 分辨率变化当作最大差异处理
            return 255.0;
        }

        let sum: u64 = a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs() as u64)
            .sum();

        sum as f32 / a.len() as f32
    }
}

impl Default for DiffScorer {
    fn default() -> Self {
        Self::new()
    }
}
