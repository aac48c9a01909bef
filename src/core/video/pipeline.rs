use super::deduplicator::{AcceptedWindow, DEFAULT_HISTOGRAM_BINS};
use super::detection::{DetectionFilter, ObjectDetector};
use super::distance::DistanceThresholds;
use super::error::{ExtractionError, Result};
use super::frame::Frame;
use super::policy::{Decision, FrameSelectionPolicy, Outcome, PolicyConfig};
use super::sink::{FrameId, FrameSink};
use super::source::FrameSource;
use super::stats::ExtractionStats;
use super::window::DEFAULT_WINDOW_CAPACITY;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const PROGRESS_EVERY: u64 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Reject frames whose largest detection covers more than this percent.
    pub max_coverage_percent: f64,
    pub similarity_threshold: f64,
    /// Sub-sampling period; only every `round(fps * interval)`-th frame is evaluated.
    pub interval_seconds: f64,
    pub resize_width: Option<u32>,
    /// Per-video cap on saved frames.
    pub max_frames: Option<u64>,
    pub save_visualization: bool,
    pub distance: DistanceThresholds,
    pub detection: DetectionFilter,
    pub window_capacity: usize,
    pub histogram_bins: u32,
    /// Used when a source does not report its frame rate.
    pub fallback_fps: f64,
    /// Videos processed concurrently; 0 means one per CPU.
    pub jobs: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_coverage_percent: 20.0,
            similarity_threshold: 0.92,
            interval_seconds: 0.5,
            resize_width: None,
            max_frames: None,
            save_visualization: true,
            distance: DistanceThresholds::default(),
            detection: DetectionFilter::default(),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            fallback_fps: 30.0,
            jobs: 1,
        }
    }
}

impl ExtractionConfig {
    /// Only far-away targets: anything above 5% coverage is rejected.
    pub fn for_distant_targets() -> Self {
        Self {
            max_coverage_percent: 5.0,
            ..Default::default()
        }
    }

    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            max_coverage_percent: self.max_coverage_percent,
            similarity_threshold: self.similarity_threshold,
            save_visualization: self.save_visualization,
            distance: self.distance,
            histogram_bins: self.histogram_bins,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ExtractionError::InvalidConfig(msg));

        if !self.interval_seconds.is_finite() || self.interval_seconds <= 0.0 {
            return invalid(format!(
                "interval_seconds must be positive, got {}",
                self.interval_seconds
            ));
        }
        if self.resize_width == Some(0) {
            return invalid("resize_width must be positive".to_string());
        }
        if self.max_frames == Some(0) {
            return invalid("max_frames must be positive".to_string());
        }
        if self.window_capacity == 0 {
            return invalid("window_capacity must be at least 1".to_string());
        }
        if !self.fallback_fps.is_finite() || self.fallback_fps <= 0.0 {
            return invalid(format!("fallback_fps must be positive, got {}", self.fallback_fps));
        }
        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return invalid(format!(
                "detection.min_confidence must be within [0, 1], got {}",
                self.detection.min_confidence
            ));
        }
        self.policy_config().validate()
    }

    /// Evaluate every n-th frame: `round(fps * interval_seconds)`, at least 1.
    pub fn sample_step(&self, fps: f64) -> u64 {
        let step = (fps * self.interval_seconds).round();
        if step.is_finite() && step >= 1.0 {
            step as u64
        } else {
            1
        }
    }
}

/// Result of processing one video.
#[derive(Debug, Clone, Default)]
pub struct VideoSummary {
    pub name: String,
    pub frames_read: u64,
    pub frames_sampled: u64,
    pub saved: u64,
    pub stopped_by_cap: bool,
    pub stats: ExtractionStats,
}

/// Drives one video through sub-sampling, the selection policy and the
/// output channels. Owns the recency window, which is emptied per video.
pub struct FrameExtractor {
    policy: FrameSelectionPolicy,
    window: AcceptedWindow,
    config: ExtractionConfig,
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self {
            policy: FrameSelectionPolicy::new(ExtractionConfig::default().policy_config()),
            window: AcceptedWindow::new(DEFAULT_WINDOW_CAPACITY),
            config: ExtractionConfig::default(),
        }
    }

    pub fn with_config(config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_policy(
            FrameSelectionPolicy::new(config.policy_config()),
            config,
        ))
    }

    /// Caller is responsible for `config` having been validated.
    pub fn with_policy(policy: FrameSelectionPolicy, config: ExtractionConfig) -> Self {
        Self {
            policy,
            window: AcceptedWindow::new(config.window_capacity),
            config,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn window(&self) -> &AcceptedWindow {
        &self.window
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Detects, filters and decides one frame without touching the window.
    /// A frame whose buffer does not match its dimensions never reaches the
    /// detector and resolves to `SkipNoDetection`.
    pub fn evaluate(&self, frame: &Frame, detector: &dyn ObjectDetector) -> Decision {
        if !frame.is_well_formed() {
            warn!(
                "⚠️ {} frame {}: {} bytes for {}x{}, skipping",
                frame.source,
                frame.frame_number,
                frame.data.len(),
                frame.width,
                frame.height
            );
            return self.policy.evaluate(frame, &self.window, Vec::new());
        }
        let detections = self.config.detection.apply(detector.detect(frame));
        self.policy.evaluate(frame, &self.window, detections)
    }

    /// Evaluates a frame and, if accepted, records it in the window.
    pub fn process_frame(&mut self, frame: Frame, detector: &dyn ObjectDetector) -> Decision {
        let decision = self.evaluate(&frame, detector);
        if decision.is_accepted() {
            self.remember(frame);
        }
        decision
    }

    fn remember(&mut self, frame: Frame) {
        let accepted = self.policy.accepted(frame);
        if let Some(evicted) = self.window.push(accepted) {
            debug!("Window evicted frame {}", evicted.frame_number());
        }
    }

    /// Resizes well-formed frames; anything else is passed through untouched
    /// so `evaluate` can resolve it.
    fn prepare(&self, frame: Frame) -> Frame {
        match self.config.resize_width {
            Some(width) if frame.is_well_formed() => match frame.resize_to_width(width) {
                Ok(resized) => resized,
                Err(e) => {
                    warn!("⚠️ Resize failed for frame {}: {}", frame.frame_number, e);
                    frame
                }
            },
            _ => frame,
        }
    }

    pub fn extract_video(
        &mut self,
        source: &mut dyn FrameSource,
        detector: &dyn ObjectDetector,
        sink: &dyn FrameSink,
    ) -> VideoSummary {
        self.reset();

        let name = source.name().to_string();
        let fps = source.fps().unwrap_or(self.config.fallback_fps);
        let step = self.config.sample_step(fps);
        info!("📹 Video: {} (fps {:.2}, evaluating every {} frames)", name, fps, step);

        let mut summary = VideoSummary {
            name: name.clone(),
            ..Default::default()
        };

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("⚠️ {}: read failed after {} frames: {}", name, summary.frames_read, e);
                    break;
                }
            };

            summary.frames_read += 1;
            summary.stats.record_frame_read();
            if summary.frames_read % step != 0 {
                continue;
            }

            let frame = self.prepare(frame);
            summary.frames_sampled += 1;

            let decision = self.evaluate(&frame, detector);
            summary.stats.record(&decision);

            match decision.outcome {
                Outcome::Accept => {
                    let id = FrameId {
                        video: name.clone(),
                        sequence: summary.saved,
                        frame_number: frame.frame_number,
                    };
                    if let Err(e) = sink.accept(&id, &frame) {
                        warn!("⚠️ Failed to save {} frame {}: {}", name, frame.frame_number, e);
                    }
                    if let Some(overlay) = &decision.visualization {
                        if let Err(e) = sink.visualize(&id, overlay) {
                            warn!("⚠️ Failed to save visualization: {}", e);
                        }
                    }

                    summary.saved += 1;
                    self.remember(frame);

                    if summary.saved % PROGRESS_EVERY == 0 {
                        info!("   ✓ {} frames saved...", summary.saved);
                    }
                    if let Some(max) = self.config.max_frames {
                        if summary.saved >= max {
                            warn!("   ⚠️ Reached max frames ({})", max);
                            summary.stopped_by_cap = true;
                            break;
                        }
                    }
                }
                Outcome::RejectTooClose => {
                    let id = FrameId {
                        video: name.clone(),
                        sequence: summary.frames_read,
                        frame_number: frame.frame_number,
                    };
                    if let Err(e) = sink.reject(&id, &frame, decision.visualization.as_ref()) {
                        warn!("⚠️ Failed to save rejected frame: {}", e);
                    }
                }
                Outcome::SkipNoDetection | Outcome::SkipSimilar => {
                    debug!("{} frame {}: {}", name, frame.frame_number, decision.outcome);
                }
            }
        }

        info!(
            "   ✅ {}: {} frames saved ({} read, {} evaluated)",
            name, summary.saved, summary.frames_read, summary.frames_sampled
        );
        summary
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}
