//! 按时间点取帧的解码抽象
//!
//! 生产实现每个 seek 点拉一次 ffmpeg，输出单帧 PNG 到管道再解码成
//! RGBA；测试用合成帧替身。

use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::core::transcode::{CanonicalVideo, TranscodeConfig};

use super::frame::Frame;

#[derive(Debug, Error)]
#[error("decode failed at {at_secs:.2}s: {detail}")]
pub struct DecodeError {
    pub at_secs: f64,
    pub detail: String,
}

/// 可寻址视频的帧解码器
pub trait FrameDecoder: Send {
    fn duration_secs(&self) -> f64;

    fn dimensions(&self) -> (u32, u32);

    /// 解码指定时间点的一帧；index 由调用方分配（运行内严格递增）
    fn decode_at(&mut self, at_secs: f64, index: u64) -> Result<Frame, DecodeError>;
}

/// ffmpeg 进程解码器
pub struct FfmpegFrameDecoder {
    ffmpeg_path: String,
    path: PathBuf,
    duration_secs: f64,
    width: u32,
    height: u32,
}

impl FfmpegFrameDecoder {
    pub fn open(config: &TranscodeConfig, video: &CanonicalVideo) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            path: video.path().to_path_buf(),
            duration_secs: video.duration_secs,
            width: video.width,
            height: video.height,
        }
    }
}

impl FrameDecoder for FfmpegFrameDecoder {
    fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn decode_at(&mut self, at_secs: f64, index: u64) -> Result<Frame, DecodeError> {
        // -ss 放在 -i 前面走关键帧快速定位
        let output = Command::new(&self.ffmpeg_path)
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{at_secs:.3}"))
            .arg("-i")
            .arg(&self.path)
            .arg("-frames:v")
            .arg("1")
            .arg("-f")
            .arg("image2")
            .arg("-c:v")
            .arg("png")
            .arg("pipe:1")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DecodeError {
                at_secs,
                detail: format!("failed to launch ffmpeg: {e}"),
            })?;

        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DecodeError {
                at_secs,
                detail: format!("ffmpeg exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let decoded = image::load_from_memory(&output.stdout).map_err(|e| DecodeError {
            at_secs,
            detail: format!("undecodable frame image: {e}"),
        })?;

        let rgba = decoded.to_rgba8();
        let (width, height) = (rgba.width(), rgba.height());

        Ok(Frame::new(
            width,
            height,
            rgba.into_raw(),
            (at_secs * 1000.0) as u64,
            index,
        ))
    }
}
