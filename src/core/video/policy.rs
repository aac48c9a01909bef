//! Per-frame ACCEPT / REJECT / SKIP decision.
//!
//! Checks run in a fixed order:
//! 1. no detections, or a frame whose pixel buffer is malformed → skip
//! 2. largest coverage above the limit → reject (still visualized)
//! 3. too similar to the newest accepted frame → skip
//! 4. otherwise accept

use super::deduplicator::{AcceptedFrame, AcceptedWindow, SimilarityDeduplicator};
use super::detection::Detection;
use super::distance::{Classification, DistanceClassifier, DistanceThresholds};
use super::error::{ExtractionError, Result};
use super::frame::Frame;
use super::visualize::{BoxOverlayRenderer, OverlayRenderer};
use log::warn;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accept,
    RejectTooClose,
    SkipNoDetection,
    SkipSimilar,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Accept => "accept",
            Outcome::RejectTooClose => "reject_too_close",
            Outcome::SkipNoDetection => "skip_no_detection",
            Outcome::SkipSimilar => "skip_similar",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Frames whose largest detection covers more than this are rejected.
    pub max_coverage_percent: f64,
    pub similarity_threshold: f64,
    pub save_visualization: bool,
    pub distance: DistanceThresholds,
    pub histogram_bins: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_coverage_percent: 20.0,
            similarity_threshold: 0.92,
            save_visualization: true,
            distance: DistanceThresholds::default(),
            histogram_bins: 8,
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.max_coverage_percent.is_finite() || self.max_coverage_percent < 0.0 {
            return Err(ExtractionError::InvalidConfig(format!(
                "max_coverage_percent must be finite and non-negative, got {}",
                self.max_coverage_percent
            )));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ExtractionError::InvalidConfig(format!(
                "similarity_threshold must be within [-1, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !(1..=256).contains(&self.histogram_bins) {
            return Err(ExtractionError::InvalidConfig(format!(
                "histogram_bins must be within [1, 256], got {}",
                self.histogram_bins
            )));
        }
        self.distance.validate()
    }
}

/// 单帧决策结果
#[derive(Debug, Clone)]
pub struct Decision {
    pub outcome: Outcome,
    pub detections: Vec<Detection>,
    /// One entry per detection, same order.
    pub classifications: Vec<Classification>,
    pub max_coverage_percent: Option<f64>,
    /// Correlation with the newest accepted frame, when it was computed.
    pub similarity: Option<f64>,
    pub visualization: Option<Frame>,
}

impl Decision {
    fn skip_no_detection() -> Self {
        Self {
            outcome: Outcome::SkipNoDetection,
            detections: Vec::new(),
            classifications: Vec::new(),
            max_coverage_percent: None,
            similarity: None,
            visualization: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == Outcome::Accept
    }
}

pub struct FrameSelectionPolicy {
    config: PolicyConfig,
    classifier: DistanceClassifier,
    deduplicator: SimilarityDeduplicator,
    renderer: Box<dyn OverlayRenderer>,
}

impl FrameSelectionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self::with_renderer(config, Box::new(BoxOverlayRenderer::new()))
    }

    pub fn with_renderer(config: PolicyConfig, renderer: Box<dyn OverlayRenderer>) -> Self {
        Self {
            classifier: DistanceClassifier::with_thresholds(config.distance),
            deduplicator: SimilarityDeduplicator::with_threshold(config.similarity_threshold)
                .with_bins(config.histogram_bins),
            renderer,
            config,
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn classifier(&self) -> &DistanceClassifier {
        &self.classifier
    }

    /// Decides a single frame. Reads the window but never modifies it, so the
    /// same inputs always produce the same decision.
    pub fn evaluate(
        &self,
        frame: &Frame,
        window: &AcceptedWindow,
        detections: Vec<Detection>,
    ) -> Decision {
        if detections.is_empty() || !frame.is_well_formed() {
            return Decision::skip_no_detection();
        }

        let classifications: Vec<Classification> = detections
            .iter()
            .map(|d| self.classifier.classify(&d.bbox, frame.width, frame.height))
            .collect();
        let max_coverage = classifications
            .iter()
            .map(|c| c.coverage_percent)
            .fold(0.0_f64, f64::max);

        if max_coverage > self.config.max_coverage_percent {
            let visualization = self.visualize(frame, &detections, &classifications);
            return Decision {
                outcome: Outcome::RejectTooClose,
                detections,
                classifications,
                max_coverage_percent: Some(max_coverage),
                similarity: None,
                visualization,
            };
        }

        let dedup = self.deduplicator.check(frame, window);
        if dedup.is_duplicate {
            // 相似帧量大，不做可视化
            return Decision {
                outcome: Outcome::SkipSimilar,
                detections,
                classifications,
                max_coverage_percent: Some(max_coverage),
                similarity: dedup.similarity,
                visualization: None,
            };
        }

        let visualization = self.visualize(frame, &detections, &classifications);
        Decision {
            outcome: Outcome::Accept,
            detections,
            classifications,
            max_coverage_percent: Some(max_coverage),
            similarity: dedup.similarity,
            visualization,
        }
    }

    /// Wraps an accepted frame for the recency window.
    pub fn accepted(&self, frame: Frame) -> AcceptedFrame {
        self.deduplicator.accepted(frame)
    }

    fn visualize(
        &self,
        frame: &Frame,
        detections: &[Detection],
        classifications: &[Classification],
    ) -> Option<Frame> {
        if !self.config.save_visualization {
            return None;
        }
        match self.renderer.render(frame, detections, classifications) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                warn!("⚠️ Visualization failed for frame {}: {}", frame.frame_number, e);
                None
            }
        }
    }
}

impl Default for FrameSelectionPolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}
