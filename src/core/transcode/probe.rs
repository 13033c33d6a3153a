//! ffprobe 元数据读取

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use super::TranscodeError;

/// 探测出的视频元数据
#[derive(Debug, Clone, Default)]
pub struct VideoMetadata {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub video_codec: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

/// 用 ffprobe 读取时长、分辨率、字节大小。没有视频流算探测失败。
pub fn probe(ffprobe_path: &str, path: &Path) -> Result<VideoMetadata, TranscodeError> {
    let output = Command::new(ffprobe_path)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| TranscodeError::Probe(format!("failed to launch {ffprobe_path}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TranscodeError::Probe(format!(
            "ffprobe exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| TranscodeError::Probe(format!("unreadable ffprobe output: {e}")))?;

    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| TranscodeError::Probe("no video stream found".to_string()))?;

    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let byte_size = parsed
        .format
        .as_ref()
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(VideoMetadata {
        duration_secs,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        byte_size,
        video_codec: video_stream.codec_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_json_shape_parses() {
        let raw = r#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720}
            ],
            "format": {"duration": "12.500000", "size": "1048576"}
        }"#;

        let parsed: ProbeOutput = serde_json::from_str(raw).unwrap();
        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .unwrap();

        assert_eq!(video.codec_name.as_deref(), Some("h264"));
        assert_eq!(video.width, Some(1280));
        assert_eq!(
            parsed.format.unwrap().duration.as_deref(),
            Some("12.500000")
        );
    }

    #[test]
    fn test_probe_missing_binary_is_probe_error() {
        let result = probe("ffprobe-definitely-not-installed", Path::new("/tmp/x.mp4"));
        assert!(matches!(result, Err(TranscodeError::Probe(_))));
    }
}
