use super::error::{ExtractionError, Result};
use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGB 格式
    pub timestamp: Duration,
    pub frame_number: u64,
    /// Name of the video the frame was read from
    pub source: Arc<str>,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
            source: Arc::from(""),
        }
    }

    pub fn from_image(image: RgbImage, timestamp_ms: u64, frame_number: u64) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw(), timestamp_ms, frame_number)
    }

    pub fn with_source(mut self, source: Arc<str>) -> Self {
        self.source = source;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Buffer length matches `width * height` RGB pixels.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.pixel_count() * 3
    }

    pub fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            ExtractionError::Decode(format!(
                "frame {} has {} bytes, expected {} for {}x{} RGB",
                self.frame_number,
                self.data.len(),
                self.pixel_count() * 3,
                self.width,
                self.height
            ))
        })
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Result<Frame> {
        let img = self.to_image()?;
        let resized = image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        Ok(Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
            timestamp: self.timestamp,
            frame_number: self.frame_number,
            source: Arc::clone(&self.source),
        })
    }

    /// 按目标宽度等比缩放（高度向下取整，至少 1 像素）
    pub fn resize_to_width(&self, target_width: u32) -> Result<Frame> {
        if self.width == 0 || target_width == self.width {
            return Ok(self.clone());
        }
        let ratio = target_width as f64 / self.width as f64;
        let target_height = ((self.height as f64 * ratio) as u32).max(1);
        self.resize_to(target_width, target_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let data = vec![255u8; 100 * 100 * 3];
        let frame = Frame::new(100, 100, data, 1000, 30);

        assert_eq!(frame.width, 100);
        assert_eq!(frame.height, 100);
        assert_eq!(frame.pixel_count(), 10000);
        assert!(frame.is_well_formed());
        assert_eq!(frame.timestamp.as_millis(), 1000);
        assert_eq!(frame.frame_number, 30);
        assert_eq!(&*frame.source, "");
    }

    #[test]
    fn test_frame_resize() {
        let data = vec![255u8; 100 * 100 * 3];
        let frame = Frame::new(100, 100, data, 0, 0).with_source(Arc::from("clip"));
        let resized = frame.resize_to(32, 32).unwrap();

        assert_eq!(resized.width, 32);
        assert_eq!(resized.height, 32);
        assert_eq!(resized.data.len(), 32 * 32 * 3);
        assert_eq!(&*resized.source, "clip");
    }

    #[test]
    fn test_resize_to_width_keeps_aspect() {
        let frame = Frame::new(640, 360, vec![10u8; 640 * 360 * 3], 0, 7);
        let resized = frame.resize_to_width(320).unwrap();

        assert_eq!(resized.width, 320);
        assert_eq!(resized.height, 180);
        assert_eq!(resized.frame_number, 7);
    }

    #[test]
    fn test_resize_same_width_is_noop() {
        let frame = Frame::new(64, 48, vec![1u8; 64 * 48 * 3], 0, 0);
        let resized = frame.resize_to_width(64).unwrap();
        assert_eq!(resized.height, 48);
        assert_eq!(resized.data, frame.data);
    }

    #[test]
    fn test_to_image_rejects_short_buffer() {
        let frame = Frame::new(10, 10, vec![0u8; 12], 0, 3);
        assert!(!frame.is_well_formed());
        assert!(matches!(frame.to_image(), Err(ExtractionError::Decode(_))));
    }
}
