//! 事件通道与取消令牌
//!
//! 管线与 UI 协作层之间只通过这里的类型通信：
//! 进度百分比、帧捕获事件、完成/失败终态。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::core::video::frame::RetainedFrame;

/// 管线阶段标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Diagnose,
    Transcode,
    Calibrate,
    Extract,
    LiveCapture,
    Assemble,
}

/// 运行统计 - 已检查帧数 / 已保留帧数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub examined: u64,
    pub retained: u64,
}

/// 共享统计句柄，单次运行独占写入
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<CaptureStats>>,
}

impl StatsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CaptureStats {
        self.inner.lock().map(|s| *s).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut stats) = self.inner.lock() {
            *stats = CaptureStats::default();
        }
    }

    pub(crate) fn record_examined(&self) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.examined += 1;
        }
    }

    pub(crate) fn record_retained(&self) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.retained += 1;
        }
    }
}

/// 类型化事件流，对应进度 / 帧捕获 / 终态三类回调
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Progress { stage: Stage, percent: u8 },
    FrameCaptured(RetainedFrame),
    Completed(CaptureStats),
    Failed { stage: Stage, message: String },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// 丢弃所有事件
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// 按序收集事件，供调用方轮询
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// 协作式取消令牌 - 每个自然挂起点检查一次
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// 单阶段进度上报 - 压到 [0,100] 且只进不退
pub struct ProgressReporter {
    stage: Stage,
    last: Option<u8>,
}

impl ProgressReporter {
    pub fn new(stage: Stage) -> Self {
        Self { stage, last: None }
    }

    pub fn report(&mut self, sink: &dyn EventSink, raw_percent: f64) {
        let clamped = raw_percent.clamp(0.0, 100.0).round() as u8;
        let percent = match self.last {
            Some(last) => clamped.max(last),
            None => clamped,
        };
        if self.last == Some(percent) {
            return;
        }
        self.last = Some(percent);
        sink.emit(PipelineEvent::Progress {
            stage: self.stage,
            percent,
        });
    }
}
