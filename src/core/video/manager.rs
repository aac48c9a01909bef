//! 多视频提取管理器

use super::detection::ObjectDetector;
use super::error::Result;
use super::pipeline::{ExtractionConfig, FrameExtractor, VideoSummary};
use super::policy::FrameSelectionPolicy;
use super::sink::FrameSink;
use super::source::{discover_videos, FrameSource, VideoRef};
use super::stats::{ExtractionStats, SharedStats, StatsSummary};
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::Path;

/// Opens a frame source for a discovered video.
pub trait SourceProvider: Sync {
    fn open(&self, video: &VideoRef) -> Result<Box<dyn FrameSource>>;
}

impl<F> SourceProvider for F
where
    F: Fn(&VideoRef) -> Result<Box<dyn FrameSource>> + Sync,
{
    fn open(&self, video: &VideoRef) -> Result<Box<dyn FrameSource>> {
        self(video)
    }
}

/// ffmpeg for video files, image decoding for image-sequence directories.
#[derive(Debug, Clone, Copy)]
pub struct DefaultSourceProvider {
    pub fallback_fps: f64,
}

impl SourceProvider for DefaultSourceProvider {
    fn open(&self, video: &VideoRef) -> Result<Box<dyn FrameSource>> {
        video.open(self.fallback_fps)
    }
}

/// Runs many videos against one configuration and accumulates run-wide
/// statistics. Each video gets its own extractor and recency window.
pub struct FrameExtractorManager {
    config: ExtractionConfig,
    stats: SharedStats,
}

impl FrameExtractorManager {
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stats: SharedStats::new(),
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn get_stats(&self) -> ExtractionStats {
        self.stats.snapshot()
    }

    pub fn summary(&self) -> StatsSummary {
        self.get_stats().summary()
    }

    fn worker_count(&self) -> usize {
        match self.config.jobs {
            0 => num_cpus::get(),
            n => n,
        }
    }

    /// Processes a single video. An unavailable source is logged and skipped
    /// without touching the statistics.
    pub fn process_video(
        &self,
        video: &VideoRef,
        provider: &dyn SourceProvider,
        detector: &dyn ObjectDetector,
        sink: &dyn FrameSink,
    ) -> Option<VideoSummary> {
        let mut source = match provider.open(video) {
            Ok(source) => source,
            Err(e) => {
                error!("❌ Cannot open video {}: {}", video.path.display(), e);
                return None;
            }
        };

        let mut extractor = FrameExtractor::with_policy(
            FrameSelectionPolicy::new(self.config.policy_config()),
            self.config.clone(),
        );
        let summary = extractor.extract_video(source.as_mut(), detector, sink);
        self.stats.merge(&summary.stats);
        Some(summary)
    }

    pub fn process_videos(
        &self,
        videos: &[VideoRef],
        provider: &dyn SourceProvider,
        detector: &dyn ObjectDetector,
        sink: &dyn FrameSink,
    ) -> Vec<VideoSummary> {
        let workers = self.worker_count().min(videos.len().max(1));
        info!(
            "🎬 {} videos, detector '{}', {} worker(s)",
            videos.len(),
            detector.name(),
            workers
        );

        if workers > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => {
                    return pool.install(|| {
                        videos
                            .par_iter()
                            .filter_map(|video| self.process_video(video, provider, detector, sink))
                            .collect()
                    });
                }
                Err(e) => warn!("⚠️ Thread pool unavailable ({}), processing sequentially", e),
            }
        }

        let total = videos.len();
        videos
            .iter()
            .enumerate()
            .filter_map(|(idx, video)| {
                info!("[{}/{}] {}", idx + 1, total, video.name);
                self.process_video(video, provider, detector, sink)
            })
            .collect()
    }

    /// Discovers videos under `dir` and processes them with the default
    /// sources.
    pub fn process_directory(
        &self,
        dir: &Path,
        detector: &dyn ObjectDetector,
        sink: &dyn FrameSink,
    ) -> Result<Vec<VideoSummary>> {
        let videos = discover_videos(dir)?;
        if videos.is_empty() {
            error!("❌ No videos found in {}", dir.display());
            return Ok(Vec::new());
        }
        let provider = DefaultSourceProvider {
            fallback_fps: self.config.fallback_fps,
        };
        Ok(self.process_videos(&videos, &provider, detector, sink))
    }
}
