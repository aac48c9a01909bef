use super::frame::Frame;
use super::window::RecencyWindow;
use log::trace;

pub const DEFAULT_HISTOGRAM_BINS: u32 = 8;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.92;

/// 三通道联合颜色直方图（bins^3 个桶，L2 归一化）
#[derive(Debug, Clone, PartialEq)]
pub struct ColorHistogram {
    bins: u32,
    values: Vec<f32>,
}

impl ColorHistogram {
    pub fn compute(frame: &Frame, bins: u32) -> Self {
        let bins = bins.clamp(1, 256);
        let b = bins as usize;
        let mut counts = vec![0u32; b * b * b];

        for px in frame.data.chunks_exact(3) {
            let r = px[0] as usize * b / 256;
            let g = px[1] as usize * b / 256;
            let bl = px[2] as usize * b / 256;
            counts[(r * b + g) * b + bl] += 1;
        }

        let norm = counts
            .iter()
            .map(|&c| (c as f64) * (c as f64))
            .sum::<f64>()
            .sqrt();
        let values = if norm > 0.0 {
            counts.iter().map(|&c| (c as f64 / norm) as f32).collect()
        } else {
            vec![0.0; counts.len()]
        };

        Self { bins, values }
    }

    pub fn bins(&self) -> u32 {
        self.bins
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Pearson correlation of the bin values, in [-1, 1].
    ///
    /// Two flat histograms have no variance to compare and score 1.0.
    /// Histograms of different granularity score 0.0.
    pub fn correlation(&self, other: &ColorHistogram) -> f64 {
        if self.values.len() != other.values.len() || self.values.is_empty() {
            return 0.0;
        }
        let n = self.values.len() as f64;
        let mean_a = self.values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mean_b = other.values.iter().map(|&v| v as f64).sum::<f64>() / n;

        let mut num = 0.0;
        let mut den_a = 0.0;
        let mut den_b = 0.0;
        for (&a, &b) in self.values.iter().zip(other.values.iter()) {
            let da = a as f64 - mean_a;
            let db = b as f64 - mean_b;
            num += da * db;
            den_a += da * da;
            den_b += db * db;
        }

        let den = (den_a * den_b).sqrt();
        if den > f64::EPSILON {
            (num / den).clamp(-1.0, 1.0)
        } else {
            1.0
        }
    }
}

/// A frame that made it into the dataset, kept for redundancy checks.
#[derive(Debug, Clone)]
pub struct AcceptedFrame {
    pub frame: Frame,
    pub histogram: ColorHistogram,
}

impl AcceptedFrame {
    pub fn frame_number(&self) -> u64 {
        self.frame.frame_number
    }
}

pub type AcceptedWindow = RecencyWindow<AcceptedFrame>;

/// 去重决策结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupDecision {
    pub is_duplicate: bool,
    /// `None` when the window was empty.
    pub similarity: Option<f64>,
}

/// Flags a frame as redundant when its colour histogram correlates with the
/// newest accepted frame above the threshold. Older window entries are not
/// consulted.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityDeduplicator {
    threshold: f64,
    bins: u32,
}

impl SimilarityDeduplicator {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_SIMILARITY_THRESHOLD)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            bins: DEFAULT_HISTOGRAM_BINS,
        }
    }

    pub fn with_bins(mut self, bins: u32) -> Self {
        self.bins = bins.clamp(1, 256);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn histogram(&self, frame: &Frame) -> ColorHistogram {
        ColorHistogram::compute(frame, self.bins)
    }

    pub fn check(&self, frame: &Frame, window: &AcceptedWindow) -> DedupDecision {
        let newest = match window.newest() {
            Some(entry) => entry,
            None => {
                return DedupDecision {
                    is_duplicate: false,
                    similarity: None,
                }
            }
        };

        let current = self.histogram(frame);
        let similarity = current.correlation(&newest.histogram);
        trace!(
            "frame {} vs accepted {}: similarity {:.4}",
            frame.frame_number,
            newest.frame_number(),
            similarity
        );

        DedupDecision {
            is_duplicate: similarity > self.threshold,
            similarity: Some(similarity),
        }
    }

    pub fn is_duplicate(&self, frame: &Frame, window: &AcceptedWindow) -> bool {
        self.check(frame, window).is_duplicate
    }

    /// Wraps a frame for insertion into the window.
    pub fn accepted(&self, frame: Frame) -> AcceptedFrame {
        let histogram = self.histogram(&frame);
        AcceptedFrame { frame, histogram }
    }
}

impl Default for SimilarityDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3], frame_number: u64) -> Frame {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::new(width, height, data, 0, frame_number)
    }

    /// Left half one colour, right half another.
    fn split(width: u32, height: u32, left: [u8; 3], right: [u8; 3], frame_number: u64) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..height {
            for x in 0..width {
                data.extend_from_slice(if x < width / 2 { &left } else { &right });
            }
        }
        Frame::new(width, height, data, 0, frame_number)
    }

    #[test]
    fn test_histogram_is_l2_normalized() {
        let hist = ColorHistogram::compute(&split(20, 20, [0, 0, 0], [255, 255, 255], 0), 8);
        assert_eq!(hist.values().len(), 512);
        let norm: f32 = hist.values().iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_identical_frames_correlate_fully() {
        let a = ColorHistogram::compute(&solid(32, 32, [200, 40, 40], 0), 8);
        let b = ColorHistogram::compute(&solid(32, 32, [200, 40, 40], 1), 8);
        assert!((a.correlation(&b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_colours_correlate_low() {
        let a = ColorHistogram::compute(&solid(32, 32, [255, 0, 0], 0), 8);
        let b = ColorHistogram::compute(&solid(32, 32, [0, 0, 255], 1), 8);
        assert!(a.correlation(&b) < 0.0);
    }

    #[test]
    fn test_empty_window_is_never_duplicate() {
        let dedup = SimilarityDeduplicator::new();
        let window = AcceptedWindow::default();
        let decision = dedup.check(&solid(16, 16, [9, 9, 9], 0), &window);
        assert!(!decision.is_duplicate);
        assert_eq!(decision.similarity, None);
    }

    #[test]
    fn test_duplicate_of_newest() {
        let dedup = SimilarityDeduplicator::new();
        let mut window = AcceptedWindow::default();
        window.push(dedup.accepted(solid(16, 16, [120, 60, 30], 1)));

        assert!(dedup.is_duplicate(&solid(16, 16, [120, 60, 30], 2), &window));
        assert!(!dedup.is_duplicate(&solid(16, 16, [10, 200, 250], 3), &window));
    }

    #[test]
    fn test_only_newest_entry_is_compared() {
        let dedup = SimilarityDeduplicator::new();
        let mut window = AcceptedWindow::default();
        window.push(dedup.accepted(solid(16, 16, [255, 0, 0], 1)));
        window.push(dedup.accepted(solid(16, 16, [0, 0, 255], 2)));

        // Matches the older entry only.
        assert!(!dedup.is_duplicate(&solid(16, 16, [255, 0, 0], 3), &window));
    }

    #[test]
    fn test_threshold_is_strict() {
        let dedup = SimilarityDeduplicator::with_threshold(1.0);
        let mut window = AcceptedWindow::default();
        window.push(dedup.accepted(solid(8, 8, [1, 2, 3], 1)));
        assert!(!dedup.is_duplicate(&solid(8, 8, [1, 2, 3], 2), &window));
    }
}
