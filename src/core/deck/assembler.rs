//! 演示文稿组装
//!
//! 把保留帧按捕获序组装成可下载的 PPTX。超过上限只留前 N 张，
//! 永远不做随机挑选。不做任何文件系统或网络 IO，字节直接交还调用方。

use log::{info, warn};
use serde::Serialize;

use crate::core::video::frame::RetainedFrame;

use super::pptx;
use super::AssemblyError;

/// 组装选项
#[derive(Debug, Clone)]
pub struct DeckOptions {
    /// 页数上限
    pub max_slides: usize,
}

impl Default for DeckOptions {
    fn default() -> Self {
        Self { max_slides: 256 }
    }
}

/// 组装产物 - 内存中的完整文档加建议文件名
#[derive(Debug, Clone, Serialize)]
pub struct Presentation {
    pub title: String,
    pub slide_count: usize,
    pub file_name: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// 组装演示文稿。输入为空是硬错误；已捕获的帧不受影响。
pub fn assemble(
    frames: &[RetainedFrame],
    title: &str,
    options: &DeckOptions,
) -> Result<Presentation, AssemblyError> {
    if frames.is_empty() {
        return Err(AssemblyError::NoFrames);
    }

    let kept = &frames[..frames.len().min(options.max_slides)];
    if kept.len() < frames.len() {
        warn!(
            "truncating {} frames to slide cap {}",
            frames.len(),
            options.max_slides
        );
    }

    let data = pptx::write_deck(kept, title)?;
    info!("assembled deck \"{}\": {} slide(s), {} bytes", title, kept.len(), data.len());

    Ok(Presentation {
        title: title.to_string(),
        slide_count: kept.len(),
        file_name: suggested_file_name(title),
        data,
    })
}

/// 从标题派生下载文件名：压掉不适合文件名的字符，限长，补 .pptx
pub fn suggested_file_name(title: &str) -> String {
    let mut stem: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    stem.truncate(64);
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        return "presentation.pptx".to_string();
    }
    format!("{stem}.pptx")
}
