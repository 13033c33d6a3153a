//! 媒体容器诊断 - 只读签名检查，不解码负载
//!
//! 先嗅探头部魔数，嗅探不出再退回声明的 MIME 与扩展名。
//! 结果只用于分流（规范格式直通 / 其它格式转码 / 未知格式拒绝）。

use serde::{Deserialize, Serialize};

/// 签名检查读取的最大头部字节数
const SNIFF_PREFIX: usize = 8192;

/// 管线的输入媒体数据
///
/// 一次管线调用独占所有权，调用结束即释放。
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub data: Vec<u8>,
    pub file_name: String,
    pub mime: String,
}

impl MediaSource {
    pub fn new(data: Vec<u8>, file_name: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            data,
            file_name: file_name.into(),
            mime: mime.into(),
        }
    }

    pub fn byte_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// 小写扩展名（不含点）
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.rsplit('.').next()?;
        if name.len() == self.file_name.len() {
            return None;
        }
        Some(name.to_ascii_lowercase())
    }
}

/// 已知容器家族。Mp4 是管线的规范目标格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFamily {
    Mp4,
    WebM,
    QuickTime,
    Avi,
    Matroska,
    Flv,
    Wmv,
    Ogg,
    ThreeGp,
    Asf,
    F4v,
    M4v,
    Unknown,
}

impl ContainerFamily {
    pub fn label(&self) -> &'static str {
        match self {
            ContainerFamily::Mp4 => "MP4",
            ContainerFamily::WebM => "WebM",
            ContainerFamily::QuickTime => "QuickTime (MOV)",
            ContainerFamily::Avi => "AVI",
            ContainerFamily::Matroska => "Matroska (MKV)",
            ContainerFamily::Flv => "FLV",
            ContainerFamily::Wmv => "WMV",
            ContainerFamily::Ogg => "Ogg (OGV)",
            ContainerFamily::ThreeGp => "3GP",
            ContainerFamily::Asf => "ASF",
            ContainerFamily::F4v => "F4V",
            ContainerFamily::M4v => "M4V",
            ContainerFamily::Unknown => "unknown",
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "video/mp4" => Some(ContainerFamily::Mp4),
            "video/webm" => Some(ContainerFamily::WebM),
            "video/quicktime" => Some(ContainerFamily::QuickTime),
            "video/x-msvideo" => Some(ContainerFamily::Avi),
            "video/x-matroska" => Some(ContainerFamily::Matroska),
            "video/x-flv" => Some(ContainerFamily::Flv),
            "video/x-ms-wmv" => Some(ContainerFamily::Wmv),
            "video/ogg" | "application/ogg" => Some(ContainerFamily::Ogg),
            "video/3gpp" => Some(ContainerFamily::ThreeGp),
            "video/x-ms-asf" => Some(ContainerFamily::Asf),
            "video/x-f4v" => Some(ContainerFamily::F4v),
            "video/x-m4v" => Some(ContainerFamily::M4v),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "mp4" => Some(ContainerFamily::Mp4),
            "webm" => Some(ContainerFamily::WebM),
            "mov" => Some(ContainerFamily::QuickTime),
            "avi" => Some(ContainerFamily::Avi),
            "mkv" => Some(ContainerFamily::Matroska),
            "flv" => Some(ContainerFamily::Flv),
            "wmv" => Some(ContainerFamily::Wmv),
            "ogv" => Some(ContainerFamily::Ogg),
            "3gp" => Some(ContainerFamily::ThreeGp),
            "asf" => Some(ContainerFamily::Asf),
            "f4v" => Some(ContainerFamily::F4v),
            "m4v" => Some(ContainerFamily::M4v),
            _ => None,
        }
    }
}

/// 诊断结果 - 每个 MediaSource 只计算一次，之后只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatProfile {
    pub family: ContainerFamily,
    /// 是否已是规范格式（可直接逐帧采样，无需转码）
    pub is_canonical: bool,
    /// 是否在支持的容器白名单内
    pub is_supported: bool,
    pub detail: String,
    /// 面向用户的修复建议，按优先级排列；对管线本身无行为影响
    pub remediation: Vec<String>,
}

/// 检查容器签名并给出分类。总是返回结果："不支持"是正常输出而非错误。
pub fn inspect(source: &MediaSource) -> FormatProfile {
    if source.data.is_empty() {
        return FormatProfile {
            family: ContainerFamily::Unknown,
            is_canonical: false,
            is_supported: false,
            detail: "file is empty".to_string(),
            remediation: unsupported_remediation(),
        };
    }

    let family = classify(source);

    match family {
        ContainerFamily::Unknown => FormatProfile {
            family,
            is_canonical: false,
            is_supported: false,
            detail: format!(
                "unrecognized container signature for \"{}\" (declared MIME: {})",
                source.file_name, source.mime
            ),
            remediation: unsupported_remediation(),
        },
        ContainerFamily::Mp4 => FormatProfile {
            family,
            is_canonical: true,
            is_supported: true,
            detail: "MP4 container, directly frame-sampable".to_string(),
            remediation: Vec::new(),
        },
        other => FormatProfile {
            family: other,
            is_canonical: false,
            is_supported: true,
            detail: format!("{} container, will be converted to MP4", other.label()),
            remediation: Vec::new(),
        },
    }
}

/// 人类可读的诊断报告，供支持/排障界面展示
pub fn diagnostic_report(source: &MediaSource, profile: &FormatProfile) -> String {
    let mut lines = vec![
        format!("file: {}", source.file_name),
        format!("declared MIME: {}", source.mime),
        format!("size: {} bytes", source.byte_size()),
        format!("detected container: {}", profile.family.label()),
        format!("canonical: {}", profile.is_canonical),
        format!("supported: {}", profile.is_supported),
        format!("detail: {}", profile.detail),
    ];
    for (i, suggestion) in profile.remediation.iter().enumerate() {
        lines.push(format!("suggestion {}: {}", i + 1, suggestion));
    }
    lines.join("\n")
}

fn classify(source: &MediaSource) -> ContainerFamily {
    // 魔数优先，只读有界前缀
    let prefix = &source.data[..source.data.len().min(SNIFF_PREFIX)];
    if let Some(kind) = infer::get(prefix) {
        if let Some(family) = ContainerFamily::from_mime(kind.mime_type()) {
            return family;
        }
    }

    if let Some(family) = ContainerFamily::from_mime(&source.mime) {
        return family;
    }

    if let Some(family) = source
        .extension()
        .as_deref()
        .and_then(ContainerFamily::from_extension)
    {
        return family;
    }

    ContainerFamily::Unknown
}

pub(crate) fn unsupported_remediation() -> Vec<String> {
    vec![
        "re-encode the video to MP4 (H.264 video, AAC audio)".to_string(),
        "export with a constant frame rate".to_string(),
        "verify the file is an actual video and not a renamed document".to_string(),
    ]
}
