//! 录屏采样器 - 墙钟定时驱动
//!
//! 与文件采样共用差分门，但时钟模型不同：没有 seek 游标，按固定
//! 间隔轮询直播流的当前画面。阈值用固定值而非标定 - 直播流没有
//! 可预扫描的有界片段。

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::core::events::{CancelToken, EventSink, PipelineEvent, StatsHandle};

use super::diff::DiffScorer;
use super::frame::Frame;

/// 取消检查的睡眠颗粒度
const TICK_SLICE: Duration = Duration::from_millis(25);

/// 直播画面来源。由屏幕捕获协作方实现；暖机期间可以返回 None
/// 或零尺寸帧，采样器会跳过而不是保留空白图。
pub trait LiveFrameSource: Send {
    fn poll_frame(&mut self) -> Option<Frame>;
}

/// 直播采样参数
#[derive(Debug, Clone)]
pub struct LiveCaptureConfig {
    /// 捕获间隔
    pub interval: Duration,
    /// 启动后的暖机等待，让流开始产出可解码画面
    pub warmup: Duration,
    /// 固定差分阈值
    pub threshold: f32,
}

impl Default for LiveCaptureConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            warmup: Duration::from_secs(2),
            threshold: 30.0,
        }
    }
}

/// 捕获循环主体，在独立线程上运行。取消后一个颗粒周期内退出，
/// 不再轮询、不再发事件；已下发的保留帧不受影响。
pub(crate) fn run_capture_loop(
    mut source: Box<dyn LiveFrameSource>,
    config: LiveCaptureConfig,
    sink: Arc<dyn EventSink>,
    cancel: CancelToken,
    stats: StatsHandle,
) {
    let mut scorer = DiffScorer::new();
    let mut index = 0u64;

    info!(
        "live capture loop started (interval {:?}, threshold {:.1})",
        config.interval, config.threshold
    );

    if sleep_cancellable(config.warmup, &cancel) {
        return;
    }

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if let Some(frame) = source.poll_frame() {
            if frame.has_usable_dimensions() {
                stats.record_examined();
                let frame = Frame { index, ..frame };

                if scorer.should_retain(&frame, config.threshold) {
                    if let Some(kept) = frame.encode_retained() {
                        stats.record_retained();
                        sink.emit(PipelineEvent::FrameCaptured(kept));
                    }
                }
            } else {
                debug!("skipping frame without usable dimensions (stream warming up)");
            }
        }

        index += 1;

        if sleep_cancellable(config.interval, &cancel) {
            break;
        }
    }

    debug!(
        "live capture loop stopped: {} examined, {} retained",
        stats.snapshot().examined,
        stats.snapshot().retained
    );
}

/// 分片睡眠，期间轮询取消标志。返回 true 表示已取消。
fn sleep_cancellable(duration: Duration, cancel: &CancelToken) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return true;
        }
        let slice = remaining.min(TICK_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
    cancel.is_cancelled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::CollectingSink;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// 假直播源：前 warmup_polls 次返回零尺寸帧，之后黑白交替
    struct FakeSource {
        polls: Arc<AtomicU64>,
        warmup_polls: u64,
    }

    impl LiveFrameSource for FakeSource {
        fn poll_frame(&mut self) -> Option<Frame> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.warmup_polls {
                return Some(Frame::new(0, 0, Vec::new(), 0, 0));
            }
            let fill = if n % 2 == 0 { 0 } else { 255 };
            Some(Frame::new(32, 32, vec![fill; 32 * 32 * 4], n * 10, 0))
        }
    }

    fn fast_config() -> LiveCaptureConfig {
        LiveCaptureConfig {
            interval: Duration::from_millis(5),
            warmup: Duration::ZERO,
            threshold: 30.0,
        }
    }

    #[test]
    fn test_warmup_frames_are_skipped_not_retained() {
        let polls = Arc::new(AtomicU64::new(0));
        let source = FakeSource {
            polls: polls.clone(),
            warmup_polls: 3,
        };
        let sink = Arc::new(CollectingSink::new());
        let cancel = CancelToken::new();
        let stats = StatsHandle::new();

        let handle = {
            let sink = sink.clone();
            let cancel = cancel.clone();
            let stats = stats.clone();
            std::thread::spawn(move || {
                run_capture_loop(Box::new(source), fast_config(), sink, cancel, stats)
            })
        };

        while polls.load(Ordering::SeqCst) < 8 {
            std::thread::sleep(Duration::from_millis(2));
        }
        cancel.cancel();
        handle.join().unwrap();

        let snapshot = stats.snapshot();
        // 暖机帧没进统计，也没变成保留帧
        assert_eq!(snapshot.examined, polls.load(Ordering::SeqCst) - 3);
        assert!(snapshot.retained >= 1);
    }

    #[test]
    fn test_cancellation_stops_events_within_a_tick() {
        let polls = Arc::new(AtomicU64::new(0));
        let source = FakeSource {
            polls: polls.clone(),
            warmup_polls: 0,
        };
        let sink = Arc::new(CollectingSink::new());
        let cancel = CancelToken::new();
        let stats = StatsHandle::new();

        let handle = {
            let sink = sink.clone();
            let cancel = cancel.clone();
            let stats = stats.clone();
            std::thread::spawn(move || {
                run_capture_loop(Box::new(source), fast_config(), sink, cancel, stats)
            })
        };

        while sink.len() < 3 {
            std::thread::sleep(Duration::from_millis(2));
        }
        cancel.cancel();
        handle.join().unwrap();

        // 线程已退出，之后不可能再有事件；保留帧原样可取
        let count_after_join = sink.len();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sink.len(), count_after_join);
        assert!(count_after_join >= 3);
    }

    #[test]
    fn test_alternating_stream_retains_every_examined_frame() {
        let polls = Arc::new(AtomicU64::new(0));
        let source = FakeSource {
            polls: polls.clone(),
            warmup_polls: 0,
        };
        let sink = Arc::new(CollectingSink::new());
        let cancel = CancelToken::new();
        let stats = StatsHandle::new();

        let handle = {
            let sink = sink.clone();
            let cancel = cancel.clone();
            let stats = stats.clone();
            std::thread::spawn(move || {
                run_capture_loop(Box::new(source), fast_config(), sink, cancel, stats)
            })
        };

        while stats.snapshot().retained < 4 {
            std::thread::sleep(Duration::from_millis(2));
        }
        cancel.cancel();
        handle.join().unwrap();

        let snapshot = stats.snapshot();
        // 黑白交替帧帧过门
        assert_eq!(snapshot.examined, snapshot.retained);
    }
}
