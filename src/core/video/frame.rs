use std::io::Cursor;
use std::time::Duration;

use image::ImageOutputFormat;
use serde::{Deserialize, Serialize};

/// 候选帧数据结构
///
/// 只活到评分结束：要么压缩成 RetainedFrame，要么立即丢弃。
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
    pub timestamp: Duration,
    pub index: u64,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, timestamp_ms: u64, index: u64) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            index,
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// 尺寸可用且缓冲完整（直播源暖机期会给出零尺寸帧）
    pub fn has_usable_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.pixel_count() * 4
    }

    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.pixel_count() * 3);
        for chunk in self.data.chunks_exact(4) {
            rgb.push(chunk[0]); // R
            rgb.push(chunk[1]); // G
            rgb.push(chunk[2]); // B
        }
        rgb
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Frame {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("Invalid frame data");
        let resized = image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
            timestamp: self.timestamp,
            index: self.index,
        }
    }

    /// JPEG 压缩（质量 70），失败返回 None
    pub fn encode_retained(&self) -> Option<RetainedFrame> {
        if !self.has_usable_dimensions() {
            return None;
        }

        let img = image::RgbImage::from_raw(self.width, self.height, self.to_rgb())?;
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageOutputFormat::Jpeg(70)).ok()?;

        Some(RetainedFrame {
            index: self.index,
            timestamp_ms: self.timestamp.as_millis() as u64,
            width: self.width,
            height: self.height,
            jpeg: buffer.into_inner(),
        })
    }
}

/// 通过差分门保留的帧 - JPEG 压缩形式
///
/// 序号在单次运行内严格递增；幻灯片顺序等于捕获顺序。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetainedFrame {
    pub index: u64,
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let data = vec![255u8; 100 * 100 * 4]; // 100x100 white image
        let frame = Frame::new(100, 100, data, 1000, 30);

        assert_eq!(frame.width, 100);
        assert_eq!(frame.height, 100);
        assert_eq!(frame.pixel_count(), 10000);
        assert_eq!(frame.timestamp.as_millis(), 1000);
        assert_eq!(frame.index, 30);
        assert!(frame.has_usable_dimensions());
    }

    #[test]
    fn test_frame_resize() {
        let data = vec![255u8; 100 * 100 * 4];
        let frame = Frame::new(100, 100, data, 0, 0);
        let resized = frame.resize_to(32, 32);

        assert_eq!(resized.width, 32);
        assert_eq!(resized.height, 32);
        assert_eq!(resized.data.len(), 32 * 32 * 4);
    }

    #[test]
    fn test_zero_dimension_frame_is_unusable() {
        let frame = Frame::new(0, 0, Vec::new(), 0, 0);
        assert!(!frame.has_usable_dimensions());
        assert!(frame.encode_retained().is_none());
    }

    #[test]
    fn test_encode_retained_produces_jpeg() {
        let data = vec![128u8; 64 * 64 * 4];
        let frame = Frame::new(64, 64, data, 2500, 7);
        let retained = frame.encode_retained().unwrap();

        assert_eq!(retained.index, 7);
        assert_eq!(retained.timestamp_ms, 2500);
        assert_eq!(retained.width, 64);
        // JPEG SOI 标记
        assert_eq!(&retained.jpeg[..2], &[0xFF, 0xD8]);
    }
}
