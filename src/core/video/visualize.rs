use super::detection::Detection;
use super::distance::{Classification, DistanceCategory};
use super::error::Result;
use super::frame::Frame;
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

/// Renders detections on top of a copy of the frame.
pub trait OverlayRenderer: Send + Sync {
    fn render(
        &self,
        frame: &Frame,
        detections: &[Detection],
        classifications: &[Classification],
    ) -> Result<Frame>;
}

/// Draws each box in its distance colour with a confidence bar above it.
#[derive(Debug, Clone, Copy)]
pub struct BoxOverlayRenderer {
    thickness: u32,
    bar_height: u32,
}

impl BoxOverlayRenderer {
    pub fn new() -> Self {
        Self {
            thickness: 2,
            bar_height: 6,
        }
    }

    pub fn color_for(category: DistanceCategory) -> Rgb<u8> {
        match category {
            DistanceCategory::Far => Rgb([0, 255, 0]),
            DistanceCategory::Medium => Rgb([255, 165, 0]),
            DistanceCategory::Close => Rgb([255, 0, 0]),
        }
    }
}

impl Default for BoxOverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayRenderer for BoxOverlayRenderer {
    fn render(
        &self,
        frame: &Frame,
        detections: &[Detection],
        classifications: &[Classification],
    ) -> Result<Frame> {
        let mut canvas = frame.to_image()?;
        let (w, h) = canvas.dimensions();
        if w == 0 || h == 0 {
            return Ok(frame.clone());
        }
        let max_x = (w - 1) as f32;
        let max_y = (h - 1) as f32;

        for (detection, classification) in detections.iter().zip(classifications) {
            let color = Self::color_for(classification.category);
            let b = &detection.bbox;
            let x1 = b.x1.clamp(0.0, max_x) as i32;
            let y1 = b.y1.clamp(0.0, max_y) as i32;
            let x2 = b.x2.clamp(0.0, max_x) as i32;
            let y2 = b.y2.clamp(0.0, max_y) as i32;
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            for t in 0..self.thickness as i32 {
                let (bw, bh) = (x2 - x1 - 2 * t, y2 - y1 - 2 * t);
                if bw <= 0 || bh <= 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(x1 + t, y1 + t).of_size(bw as u32, bh as u32),
                    color,
                );
            }

            let bar_width = ((x2 - x1) as f32 * detection.confidence.clamp(0.0, 1.0)) as u32;
            if bar_width > 0 {
                // 框顶部空间不足时画在框内
                let bar_y = if y1 >= self.bar_height as i32 {
                    y1 - self.bar_height as i32
                } else {
                    y1
                };
                draw_filled_rect_mut(
                    &mut canvas,
                    Rect::at(x1, bar_y).of_size(bar_width, self.bar_height),
                    color,
                );
            }
        }

        Ok(Frame {
            width: w,
            height: h,
            data: canvas.into_raw(),
            timestamp: frame.timestamp,
            frame_number: frame.frame_number,
            source: frame.source.clone(),
        })
    }
}
