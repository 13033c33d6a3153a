//! 录屏捕获会话

use std::sync::Arc;
use std::thread::JoinHandle;

use log::info;

use crate::core::events::{CancelToken, CaptureStats, EventSink, StatsHandle};
use crate::core::video::live::{run_capture_loop, LiveCaptureConfig, LiveFrameSource};

/// 录屏采样入口
pub struct LiveCapture;

impl LiveCapture {
    /// 启动定时捕获会话。循环跑在独立线程上，不会阻塞流的
    /// 预览消费；返回的句柄用于查询统计和停止会话。
    pub fn start(
        source: Box<dyn LiveFrameSource>,
        config: LiveCaptureConfig,
        sink: Arc<dyn EventSink>,
    ) -> CaptureHandle {
        info!(
            "🎥 LiveCapture: session started (interval {:?}, warmup {:?})",
            config.interval, config.warmup
        );

        let cancel = CancelToken::new();
        let stats = StatsHandle::new();

        let join = {
            let cancel = cancel.clone();
            let stats = stats.clone();
            std::thread::spawn(move || run_capture_loop(source, config, sink, cancel, stats))
        };

        CaptureHandle {
            cancel,
            stats,
            join: Some(join),
        }
    }
}

/// 捕获会话句柄 - 会话离开活跃态的瞬间停止采样
pub struct CaptureHandle {
    cancel: CancelToken,
    stats: StatsHandle,
    join: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats.snapshot()
    }

    /// 停止会话并等待捕获线程退出。之后不会再有任何定时器触发
    /// 或事件下发；已保留的帧原样有效。
    pub fn stop(mut self) -> CaptureStats {
        self.shutdown();
        self.stats.snapshot()
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.shutdown();
        info!("🗑️ LiveCapture: session released");
    }
}
