//! 幻灯片文档生成器

use log::info;

use crate::core::deck::{self, AssemblyError, DeckOptions, Presentation};
use crate::core::video::RetainedFrame;

/// 演示文稿生成器 - 帧序列进，PPTX 字节出
pub struct DeckBuilder {
    options: DeckOptions,
}

impl DeckBuilder {
    pub fn create() -> Self {
        info!("📑 DeckBuilder: created");
        Self::with_options(DeckOptions::default())
    }

    pub fn with_options(options: DeckOptions) -> Self {
        Self { options }
    }

    /// 组装文档。输入顺序就是页面顺序；超过上限截前 N 张。
    pub fn build(
        &self,
        frames: &[RetainedFrame],
        title: &str,
    ) -> Result<Presentation, AssemblyError> {
        deck::assemble(frames, title, &self.options)
    }
}

impl Default for DeckBuilder {
    fn default() -> Self {
        Self::create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(index: u64) -> RetainedFrame {
        RetainedFrame {
            index,
            timestamp_ms: index * 3000,
            width: 640,
            height: 360,
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xE0],
        }
    }

    #[test]
    fn test_build_reports_slide_count_and_file_name() {
        let builder = DeckBuilder::with_options(DeckOptions { max_slides: 8 });
        let frames: Vec<RetainedFrame> = (0..20).map(test_frame).collect();

        let deck = builder.build(&frames, "Weekly Review").unwrap();

        assert_eq!(deck.slide_count, 8);
        assert_eq!(deck.file_name, "Weekly_Review.pptx");
    }

    #[test]
    fn test_build_empty_fails() {
        let builder = DeckBuilder::with_options(DeckOptions::default());
        assert!(matches!(
            builder.build(&[], "Empty"),
            Err(AssemblyError::NoFrames)
        ));
    }
}
