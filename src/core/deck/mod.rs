//! 幻灯片文档生成

pub mod assembler;
pub mod pptx;

use thiserror::Error;

pub use assembler::{assemble, suggested_file_name, DeckOptions, Presentation};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("no frames to assemble")]
    NoFrames,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document write failed: {0}")]
    Document(String),
}
