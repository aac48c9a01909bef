use super::distance::DistanceCategory;
use super::policy::{Decision, Outcome};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// 提取统计
///
/// Counters only ever grow. Every evaluated frame lands in exactly one of
/// the four outcome counters; the distance counters tally every detection
/// that was classified, whatever the frame's outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Frames decoded, including those dropped by sub-sampling.
    pub frames_read: u64,
    pub total_frames_considered: u64,
    pub saved: u64,
    pub skipped_too_close: u64,
    pub skipped_no_detection: u64,
    pub skipped_similar: u64,
    pub distance_far: u64,
    pub distance_medium: u64,
    pub distance_close: u64,
}

impl ExtractionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_read(&mut self) {
        self.frames_read += 1;
    }

    pub fn record_category(&mut self, category: DistanceCategory) {
        match category {
            DistanceCategory::Far => self.distance_far += 1,
            DistanceCategory::Medium => self.distance_medium += 1,
            DistanceCategory::Close => self.distance_close += 1,
        }
    }

    pub fn record_outcome(&mut self, outcome: Outcome) {
        self.total_frames_considered += 1;
        match outcome {
            Outcome::Accept => self.saved += 1,
            Outcome::RejectTooClose => self.skipped_too_close += 1,
            Outcome::SkipNoDetection => self.skipped_no_detection += 1,
            Outcome::SkipSimilar => self.skipped_similar += 1,
        }
    }

    pub fn record(&mut self, decision: &Decision) {
        for classification in &decision.classifications {
            self.record_category(classification.category);
        }
        self.record_outcome(decision.outcome);
    }

    pub fn merge(&mut self, other: &ExtractionStats) {
        self.frames_read += other.frames_read;
        self.total_frames_considered += other.total_frames_considered;
        self.saved += other.saved;
        self.skipped_too_close += other.skipped_too_close;
        self.skipped_no_detection += other.skipped_no_detection;
        self.skipped_similar += other.skipped_similar;
        self.distance_far += other.distance_far;
        self.distance_medium += other.distance_medium;
        self.distance_close += other.distance_close;
    }

    pub fn category_count(&self, category: DistanceCategory) -> u64 {
        match category {
            DistanceCategory::Far => self.distance_far,
            DistanceCategory::Medium => self.distance_medium,
            DistanceCategory::Close => self.distance_close,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.saved + self.skipped_too_close + self.skipped_no_detection + self.skipped_similar
            == self.total_frames_considered
    }

    /// `saved / total_frames_considered`, `None` before any frame was evaluated.
    pub fn efficiency(&self) -> Option<f64> {
        if self.total_frames_considered == 0 {
            None
        } else {
            Some(self.saved as f64 / self.total_frames_considered as f64)
        }
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            stats: *self,
            efficiency: self.efficiency(),
        }
    }
}

/// Run-wide statistics shared between per-video workers.
///
/// Workers tally into their own [`ExtractionStats`] and merge once a video
/// completes, so readers never observe a half-processed frame.
#[derive(Debug, Clone, Default)]
pub struct SharedStats {
    inner: Arc<Mutex<ExtractionStats>>,
}

impl SharedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, stats: &ExtractionStats) {
        match self.inner.lock() {
            Ok(mut total) => total.merge(stats),
            Err(poisoned) => poisoned.into_inner().merge(stats),
        }
    }

    pub fn snapshot(&self) -> ExtractionStats {
        match self.inner.lock() {
            Ok(total) => *total,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Final report including the derived efficiency ratio.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSummary {
    #[serde(flatten)]
    pub stats: ExtractionStats,
    pub efficiency: Option<f64>,
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "📊 EXTRACTION STATISTICS")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Frames read:        {}", s.frames_read)?;
        writeln!(f, "Frames considered:  {}", s.total_frames_considered)?;
        writeln!(f, "Frames saved:       {}", s.saved)?;
        writeln!(f)?;
        writeln!(f, "🎯 DISTANCE DISTRIBUTION (all detections):")?;
        writeln!(f, "   Far:    {}", s.distance_far)?;
        writeln!(f, "   Medium: {}", s.distance_medium)?;
        writeln!(f, "   Close:  {}", s.distance_close)?;
        writeln!(f)?;
        writeln!(f, "❌ NOT SAVED:")?;
        writeln!(f, "   Too close:     {}", s.skipped_too_close)?;
        writeln!(f, "   No detection:  {}", s.skipped_no_detection)?;
        writeln!(f, "   Similar:       {}", s.skipped_similar)?;
        if let Some(efficiency) = self.efficiency {
            writeln!(f)?;
            writeln!(f, "✅ Efficiency: {:.2}%", efficiency * 100.0)?;
        }
        write!(f, "{}", rule)
    }
}
