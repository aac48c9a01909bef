//! Apparent-distance classification from bounding-box coverage.

use super::detection::BoundingBox;
use super::error::{ExtractionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceCategory {
    Far,
    Medium,
    Close,
}

impl DistanceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceCategory::Far => "far",
            DistanceCategory::Medium => "medium",
            DistanceCategory::Close => "close",
        }
    }
}

impl fmt::Display for DistanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category boundaries in percent of frame area. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceThresholds {
    pub medium_min_percent: f64,
    pub close_min_percent: f64,
}

impl Default for DistanceThresholds {
    fn default() -> Self {
        Self {
            medium_min_percent: 5.0,
            close_min_percent: 20.0,
        }
    }
}

impl DistanceThresholds {
    pub fn validate(&self) -> Result<()> {
        let (medium, close) = (self.medium_min_percent, self.close_min_percent);
        if !medium.is_finite() || !close.is_finite() || medium < 0.0 {
            return Err(ExtractionError::InvalidConfig(format!(
                "distance thresholds must be finite and non-negative (medium={}, close={})",
                medium, close
            )));
        }
        if medium >= close {
            return Err(ExtractionError::InvalidConfig(format!(
                "medium_min_percent ({}) must be below close_min_percent ({})",
                medium, close
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub category: DistanceCategory,
    pub coverage_percent: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceClassifier {
    thresholds: DistanceThresholds,
}

impl DistanceClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: DistanceThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DistanceThresholds {
        &self.thresholds
    }

    /// 计算框占画面的百分比并分类；零面积画面或退化框记为 0%（FAR）
    pub fn classify(&self, bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> Classification {
        let frame_area = frame_width as f64 * frame_height as f64;
        let coverage_percent = if frame_area > 0.0 {
            100.0 * bbox.area() / frame_area
        } else {
            0.0
        };
        Classification {
            category: self.category_for(coverage_percent),
            coverage_percent,
        }
    }

    pub fn category_for(&self, coverage_percent: f64) -> DistanceCategory {
        if coverage_percent < self.thresholds.medium_min_percent {
            DistanceCategory::Far
        } else if coverage_percent < self.thresholds.close_min_percent {
            DistanceCategory::Medium
        } else {
            DistanceCategory::Close
        }
    }
}
