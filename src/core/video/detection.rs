use super::error::Result;
use super::frame::Frame;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Axis-aligned box in pixel coordinates, serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// 退化框（负宽高、NaN）面积记为 0
    pub fn area(&self) -> f64 {
        let area = self.width() as f64 * self.height() as f64;
        if area.is_finite() {
            area
        } else {
            0.0
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: u32,
    #[serde(default)]
    pub class_name: String,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: u32, class_name: &str) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            class_name: class_name.to_string(),
        }
    }
}

/// Object detector capability consumed by the extraction pipeline.
///
/// Implementations return an empty list when nothing is found; a detector
/// that cannot run at all should behave like [`NullDetector`].
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Vec<Detection>;

    fn name(&self) -> &str {
        "detector"
    }
}

/// Detector used when no model is configured. Every frame ends up as
/// "no detection".
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

impl ObjectDetector for NullDetector {
    fn detect(&self, _frame: &Frame) -> Vec<Detection> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "null"
    }
}

type DetectionPattern = Box<dyn Fn(&Frame) -> Vec<Detection> + Send + Sync>;

pub struct MockDetector {
    // 按帧返回预设的检测结果
    pattern: Option<DetectionPattern>,
}

impl MockDetector {
    pub fn new() -> Self {
        Self { pattern: None }
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(&Frame) -> Vec<Detection> + Send + Sync + 'static,
    {
        Self {
            pattern: Some(Box::new(pattern)),
        }
    }

    /// Returns the same detections for every frame.
    pub fn always(detections: Vec<Detection>) -> Self {
        Self::with_pattern(move |_| detections.clone())
    }

    pub fn with_fixed_frames(frames: HashMap<u64, Vec<Detection>>) -> Self {
        Self::with_pattern(move |frame| {
            frames
                .get(&frame.frame_number)
                .cloned()
                .unwrap_or_default()
        })
    }
}

impl Default for MockDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectDetector for MockDetector {
    fn detect(&self, frame: &Frame) -> Vec<Detection> {
        self.pattern
            .as_ref()
            .map(|p| p(frame))
            .unwrap_or_default()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Detections computed offline, keyed by video name then frame number.
///
/// ```json
/// { "clip_01": { "12": [ { "bbox": [10, 20, 60, 45], "confidence": 0.4,
///                          "class_id": 4, "class_name": "airplane" } ] } }
/// ```
#[derive(Debug, Default)]
pub struct PrecomputedDetector {
    by_video: HashMap<String, HashMap<u64, Vec<Detection>>>,
}

impl PrecomputedDetector {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let by_video: HashMap<String, HashMap<u64, Vec<Detection>>> = serde_json::from_str(json)?;
        let total: usize = by_video.values().map(|frames| frames.len()).sum();
        debug!(
            "Precomputed detections: {} videos, {} frames",
            by_video.len(),
            total
        );
        Ok(Self { by_video })
    }

    pub fn load(path: &Path) -> Result<Self> {
        info!("📦 Loading precomputed detections from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn video_count(&self) -> usize {
        self.by_video.len()
    }
}

impl ObjectDetector for PrecomputedDetector {
    fn detect(&self, frame: &Frame) -> Vec<Detection> {
        self.by_video
            .get(&*frame.source)
            .and_then(|frames| frames.get(&frame.frame_number))
            .cloned()
            .unwrap_or_default()
    }

    fn name(&self) -> &str {
        "precomputed"
    }
}

/// Confidence threshold and class allow-list applied to raw detector output
/// before the selection policy sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionFilter {
    /// Detections must score strictly above this.
    pub min_confidence: f32,
    /// Empty list admits every class.
    pub allowed_classes: Vec<u32>,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            min_confidence: 0.15,
            // COCO: 4=airplane, 14=bird, 32=sports ball, 33=kite
            allowed_classes: vec![4, 14, 32, 33],
        }
    }
}

impl DetectionFilter {
    pub fn admits(&self, detection: &Detection) -> bool {
        detection.confidence > self.min_confidence
            && (self.allowed_classes.is_empty()
                || self.allowed_classes.contains(&detection.class_id))
    }

    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections.into_iter().filter(|d| self.admits(d)).collect()
    }
}
