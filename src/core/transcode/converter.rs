//! 两级转码执行器
//!
//! 流复制把已编码的音视频流重新打包进 MP4 容器，比重编码快一到两个
//! 数量级且无损，但要求源编解码器与容器兼容；兼容性不靠预判，直接
//! 尝试，ffmpeg 退出码说了算。确认失败后才走完整重编码。

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::TempPath;

use crate::core::diagnostics::{self, MediaSource};
use crate::core::events::{CancelToken, EventSink, ProgressReporter, Stage};

use super::probe::{self, VideoMetadata};
use super::TranscodeError;

/// ffmpeg -progress pipe:1 输出的时间行（微秒）
static OUT_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^out_time_ms=(\d+)").expect("valid regex"));

/// 保留给错误信息的 stderr 尾部长度
const STDERR_TAIL: usize = 400;

/// 转码器配置
#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// 重编码质量（x264 CRF）
    pub crf: u32,
    /// x264 preset
    pub preset: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            crf: 23,
            preset: "veryfast".to_string(),
        }
    }
}

/// 规范化输出 - 可寻址、可逐帧解码的 MP4
///
/// 持有底层临时文件的生命周期；被丢弃时文件随之删除，
/// 运行之外不会有任何东西引用它。
#[derive(Debug)]
pub struct CanonicalVideo {
    scratch: TempPath,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
}

impl CanonicalVideo {
    fn from_scratch(scratch: TempPath, meta: VideoMetadata) -> Self {
        Self {
            scratch,
            duration_secs: meta.duration_secs,
            width: meta.width,
            height: meta.height,
            byte_size: meta.byte_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.scratch
    }
}

/// 转换后端抽象 - 生产实现拉起 ffmpeg 进程，测试用替身
pub trait ConvertBackend: Send + Sync {
    fn probe(&self, path: &Path) -> Result<VideoMetadata, TranscodeError>;

    fn stream_copy(
        &self,
        input: &Path,
        output: &Path,
        duration_secs: Option<f64>,
        progress: &mut dyn FnMut(f64),
        cancel: &CancelToken,
    ) -> Result<(), TranscodeError>;

    fn re_encode(
        &self,
        input: &Path,
        output: &Path,
        duration_secs: Option<f64>,
        progress: &mut dyn FnMut(f64),
        cancel: &CancelToken,
    ) -> Result<(), TranscodeError>;
}

/// ffmpeg 进程后端
pub struct FfmpegBackend {
    config: TranscodeConfig,
}

impl FfmpegBackend {
    pub fn new(config: TranscodeConfig) -> Self {
        Self { config }
    }

    fn base_command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-nostats")
            .arg("-progress")
            .arg("pipe:1")
            .arg("-i")
            .arg(input);
        cmd
    }

    fn run(
        &self,
        mut cmd: Command,
        duration_secs: Option<f64>,
        strategy: &'static str,
        progress: &mut dyn FnMut(f64),
        cancel: &CancelToken,
    ) -> Result<(), TranscodeError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;

        // stderr 单独线程排空，防止管道互相堵死
        let stderr_handle = child.stderr.take();
        let stderr_task = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr_handle {
                let _ = stderr.read_to_string(&mut buf);
            }
            buf
        });

        if let Some(stdout) = child.stdout.take() {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };

                if cancel.is_cancelled() {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stderr_task.join();
                    return Err(TranscodeError::Cancelled);
                }

                if let Some(caps) = OUT_TIME_RE.captures(&line) {
                    if let (Some(total), Ok(micros)) =
                        (duration_secs, caps[1].parse::<u64>())
                    {
                        if total > 0.0 {
                            progress(micros as f64 / 1_000_000.0 / total * 100.0);
                        }
                    }
                }
            }
        }

        let status = child.wait()?;
        let stderr_output = stderr_task.join().unwrap_or_default();

        if !status.success() {
            let tail: String = stderr_output
                .trim()
                .chars()
                .rev()
                .take(STDERR_TAIL)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return Err(TranscodeError::StrategyFailed {
                strategy,
                detail: format!("ffmpeg exited with {status}: {tail}"),
            });
        }

        progress(100.0);
        Ok(())
    }
}

impl ConvertBackend for FfmpegBackend {
    fn probe(&self, path: &Path) -> Result<VideoMetadata, TranscodeError> {
        probe::probe(&self.config.ffprobe_path, path)
    }

    fn stream_copy(
        &self,
        input: &Path,
        output: &Path,
        duration_secs: Option<f64>,
        progress: &mut dyn FnMut(f64),
        cancel: &CancelToken,
    ) -> Result<(), TranscodeError> {
        let mut cmd = self.base_command(input);
        cmd.arg("-c")
            .arg("copy")
            .arg("-movflags")
            .arg("+faststart")
            .arg(output);
        self.run(cmd, duration_secs, "stream copy", progress, cancel)
    }

    fn re_encode(
        &self,
        input: &Path,
        output: &Path,
        duration_secs: Option<f64>,
        progress: &mut dyn FnMut(f64),
        cancel: &CancelToken,
    ) -> Result<(), TranscodeError> {
        let mut cmd = self.base_command(input);
        cmd.arg("-c:v")
            .arg("libx264")
            .arg("-preset")
            .arg(&self.config.preset)
            .arg("-crf")
            .arg(self.config.crf.to_string())
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-c:a")
            .arg("aac")
            .arg("-movflags")
            .arg("+faststart")
            .arg(output);
        self.run(cmd, duration_secs, "re-encode", progress, cancel)
    }
}

/// 规范化入口。诊断不过关的源在这里硬失败，绝不静默放行。
pub struct Transcoder {
    backend: Box<dyn ConvertBackend>,
}

impl Transcoder {
    pub fn new() -> Self {
        Self::with_config(TranscodeConfig::default())
    }

    pub fn with_config(config: TranscodeConfig) -> Self {
        Self {
            backend: Box::new(FfmpegBackend::new(config)),
        }
    }

    pub fn with_backend(backend: Box<dyn ConvertBackend>) -> Self {
        Self { backend }
    }

    pub fn normalize(
        &self,
        source: &MediaSource,
        sink: &dyn EventSink,
        cancel: &CancelToken,
    ) -> Result<CanonicalVideo, TranscodeError> {
        let profile = diagnostics::inspect(source);
        if !profile.is_supported {
            return Err(TranscodeError::Unsupported {
                format: profile.family.label().to_string(),
                remediation: profile.remediation,
            });
        }

        let mut reporter = ProgressReporter::new(Stage::Transcode);
        let input = write_scratch(source)?;

        if cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }

        if profile.is_canonical {
            debug!("source already canonical, skipping conversion");
            let meta = self.backend.probe(&input)?;
            reporter.report(sink, 100.0);
            return Ok(CanonicalVideo::from_scratch(input, meta));
        }

        // 进度基准用输入时长；输入探测不动就按时长未知继续
        let input_meta = self.backend.probe(&input).ok();
        let duration = input_meta
            .as_ref()
            .map(|m| m.duration_secs)
            .filter(|d| *d > 0.0);
        if let Some(meta) = &input_meta {
            info!(
                "normalizing {} ({}x{}, {:.1}s, codec {})",
                profile.family.label(),
                meta.width,
                meta.height,
                meta.duration_secs,
                meta.video_codec.as_deref().unwrap_or("unknown")
            );
        }

        let output = tempfile::Builder::new()
            .prefix("deck-canonical-")
            .suffix(".mp4")
            .tempfile()?
            .into_temp_path();

        // 一级：流复制
        let copied = self.backend.stream_copy(
            &input,
            &output,
            duration,
            &mut |p| reporter.report(sink, p),
            cancel,
        );
        match copied {
            Ok(()) => match self.backend.probe(&output) {
                Ok(meta) => {
                    info!("stream copy succeeded for {}", profile.family.label());
                    reporter.report(sink, 100.0);
                    return Ok(CanonicalVideo::from_scratch(output, meta));
                }
                Err(e) => {
                    warn!("stream copy output failed probe, falling back to re-encode: {e}");
                }
            },
            Err(TranscodeError::Cancelled) => return Err(TranscodeError::Cancelled),
            Err(e) => {
                warn!("stream copy rejected, falling back to re-encode: {e}");
            }
        }

        // 二级：重编码
        match self.backend.re_encode(
            &input,
            &output,
            duration,
            &mut |p| reporter.report(sink, p),
            cancel,
        ) {
            Ok(()) => {
                let meta = self.backend.probe(&output)?;
                info!("re-encode succeeded for {}", profile.family.label());
                reporter.report(sink, 100.0);
                Ok(CanonicalVideo::from_scratch(output, meta))
            }
            Err(TranscodeError::Cancelled) => Err(TranscodeError::Cancelled),
            Err(e) => Err(TranscodeError::ConversionFailed {
                format: profile.family.label().to_string(),
                detail: e.to_string(),
                remediation: diagnostics::unsupported_remediation(),
            }),
        }
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new()
    }
}

/// 输入 blob 落到临时文件，保留扩展名供 ffmpeg 识别容器
fn write_scratch(source: &MediaSource) -> Result<TempPath, TranscodeError> {
    let suffix = source
        .extension()
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".bin".to_string());

    let mut file = tempfile::Builder::new()
        .prefix("deck-source-")
        .suffix(&suffix)
        .tempfile()?;
    file.write_all(&source.data)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::CollectingSink;
    use std::sync::{Arc, Mutex};

    /// 测试替身：记录调用顺序，可配置流复制失败
    struct MockBackend {
        copy_fails: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl MockBackend {
        fn new(copy_fails: bool) -> (Self, Arc<Mutex<Vec<&'static str>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    copy_fails,
                    calls: calls.clone(),
                },
                calls,
            )
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ConvertBackend for MockBackend {
        fn probe(&self, _path: &Path) -> Result<VideoMetadata, TranscodeError> {
            self.record("probe");
            Ok(VideoMetadata {
                duration_secs: 10.0,
                width: 640,
                height: 360,
                byte_size: 1024,
                video_codec: Some("h264".to_string()),
            })
        }

        fn stream_copy(
            &self,
            _input: &Path,
            _output: &Path,
            _duration_secs: Option<f64>,
            progress: &mut dyn FnMut(f64),
            _cancel: &CancelToken,
        ) -> Result<(), TranscodeError> {
            self.record("stream_copy");
            if self.copy_fails {
                return Err(TranscodeError::StrategyFailed {
                    strategy: "stream copy",
                    detail: "codec not compatible with mp4".to_string(),
                });
            }
            progress(100.0);
            Ok(())
        }

        fn re_encode(
            &self,
            _input: &Path,
            _output: &Path,
            _duration_secs: Option<f64>,
            progress: &mut dyn FnMut(f64),
            _cancel: &CancelToken,
        ) -> Result<(), TranscodeError> {
            self.record("re_encode");
            progress(100.0);
            Ok(())
        }
    }

    fn webm_source() -> MediaSource {
        MediaSource::new(vec![0u8; 128], "screen.webm", "video/webm")
    }

    fn mp4_source() -> MediaSource {
        let mut data = vec![0x00, 0x00, 0x00, 0x18];
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
        data.extend_from_slice(b"isomiso2avc1mp41");
        data.resize(128, 0);
        MediaSource::new(data, "clip.mp4", "video/mp4")
    }

    #[test]
    fn test_stream_copy_attempted_before_re_encode() {
        let (backend, calls) = MockBackend::new(false);
        let transcoder = Transcoder::with_backend(Box::new(backend));
        let sink = CollectingSink::new();

        let video = transcoder
            .normalize(&webm_source(), &sink, &CancelToken::new())
            .unwrap();

        assert_eq!(video.duration_secs, 10.0);
        assert_eq!(
            calls.lock().unwrap().clone(),
            vec!["probe", "stream_copy", "probe"]
        );
    }

    #[test]
    fn test_re_encode_fallback_still_yields_canonical_video() {
        let (backend, calls) = MockBackend::new(true);
        let transcoder = Transcoder::with_backend(Box::new(backend));
        let sink = CollectingSink::new();

        let video = transcoder
            .normalize(&webm_source(), &sink, &CancelToken::new())
            .unwrap();

        assert_eq!(video.width, 640);
        assert_eq!(
            calls.lock().unwrap().clone(),
            vec!["probe", "stream_copy", "re_encode", "probe"]
        );
    }

    #[test]
    fn test_canonical_source_skips_conversion() {
        let (backend, calls) = MockBackend::new(false);
        let transcoder = Transcoder::with_backend(Box::new(backend));
        let sink = CollectingSink::new();

        transcoder
            .normalize(&mp4_source(), &sink, &CancelToken::new())
            .unwrap();

        assert_eq!(calls.lock().unwrap().clone(), vec!["probe"]);
    }

    #[test]
    fn test_unsupported_source_is_hard_failure() {
        let (backend, calls) = MockBackend::new(false);
        let transcoder = Transcoder::with_backend(Box::new(backend));
        let sink = CollectingSink::new();
        let source = MediaSource::new(vec![0xde, 0xad], "weird.bin", "application/octet-stream");

        let result = transcoder.normalize(&source, &sink, &CancelToken::new());

        match result {
            Err(TranscodeError::Unsupported { remediation, .. }) => {
                assert!(!remediation.is_empty());
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pre_cancelled_run_stops_before_probing() {
        let (backend, calls) = MockBackend::new(false);
        let transcoder = Transcoder::with_backend(Box::new(backend));
        let sink = CollectingSink::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = transcoder.normalize(&webm_source(), &sink, &cancel);
        assert!(matches!(result, Err(TranscodeError::Cancelled)));
        assert!(calls.lock().unwrap().is_empty());
    }
}
