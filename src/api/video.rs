//! 数据集抽帧入口

use crate::core::video::{
    load_config, DirectorySink, ExtractionConfig, ExtractionStats, FrameExtractorManager,
    NullDetector, ObjectDetector, PrecomputedDetector, Result, StatsSummary, VideoSummary,
};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Curates a directory of videos into an accepted / rejected / visualized
/// frame dataset.
///
/// ```no_run
/// use frame_curator::api::video::DatasetCurator;
/// use frame_curator::core::video::ExtractionConfig;
///
/// let curator = DatasetCurator::create(ExtractionConfig::default(), "dataset".as_ref())?;
/// curator.run("videos".as_ref())?;
/// println!("{}", curator.summary());
/// # Ok::<(), frame_curator::core::video::ExtractionError>(())
/// ```
pub struct DatasetCurator {
    manager: FrameExtractorManager,
    sink: DirectorySink,
    detector: Option<Box<dyn ObjectDetector>>,
}

impl DatasetCurator {
    /// Without detections every frame is skipped; attach a detector with
    /// [`DatasetCurator::with_detector`] or [`DatasetCurator::with_detections_file`].
    pub fn create(config: ExtractionConfig, output_dir: &Path) -> Result<Self> {
        let manager = FrameExtractorManager::new(config)?;
        let sink = DirectorySink::create(output_dir)?;
        info!("🎬 DatasetCurator: writing to {}", output_dir.display());
        Ok(Self {
            manager,
            sink,
            detector: None,
        })
    }

    pub fn from_config_file(config_path: &Path, output_dir: &Path) -> Result<Self> {
        Self::create(load_config(config_path)?, output_dir)
    }

    pub fn with_detector(mut self, detector: Box<dyn ObjectDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_detections_file(self, path: &Path) -> Result<Self> {
        let detector = PrecomputedDetector::load(path)?;
        info!("Loaded detections for {} videos", detector.video_count());
        Ok(self.with_detector(Box::new(detector)))
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    pub fn config(&self) -> &ExtractionConfig {
        self.manager.config()
    }

    pub fn output_dirs(&self) -> [PathBuf; 3] {
        [
            self.sink.accepted_dir().to_path_buf(),
            self.sink.rejected_dir().to_path_buf(),
            self.sink.visualized_dir().to_path_buf(),
        ]
    }

    pub fn run(&self, input_dir: &Path) -> Result<Vec<VideoSummary>> {
        let detector: &dyn ObjectDetector = match &self.detector {
            Some(detector) => detector.as_ref(),
            None => {
                warn!("⚠️ No detector configured, every frame will be skipped");
                &NullDetector
            }
        };
        let summaries = self
            .manager
            .process_directory(input_dir, detector, &self.sink)?;
        info!("✅ Extraction complete: {} videos processed", summaries.len());
        Ok(summaries)
    }

    pub fn stats(&self) -> ExtractionStats {
        self.manager.get_stats()
    }

    pub fn summary(&self) -> StatsSummary {
        self.manager.summary()
    }
}

impl Drop for DatasetCurator {
    fn drop(&mut self) {
        info!("🗑️ DatasetCurator: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::MockDetector;

    #[test]
    fn test_detector_is_optional() {
        let root = tempfile::tempdir().unwrap();
        let curator =
            DatasetCurator::create(ExtractionConfig::default(), &root.path().join("out")).unwrap();
        assert!(!curator.has_detector());

        let curator = curator.with_detector(Box::new(MockDetector::new()));
        assert!(curator.has_detector());
    }

    #[test]
    fn test_run_without_detector_counts_no_detection() {
        let root = tempfile::tempdir().unwrap();
        let seq = root.path().join("videos").join("clip");
        std::fs::create_dir_all(&seq).unwrap();
        for i in 0..3u8 {
            image::RgbImage::from_pixel(8, 8, image::Rgb([i * 40, 10, 10]))
                .save(seq.join(format!("{:02}.png", i)))
                .unwrap();
        }
        let config = ExtractionConfig {
            interval_seconds: 1.0,
            fallback_fps: 1.0,
            ..Default::default()
        };
        let curator = DatasetCurator::create(config, &root.path().join("out")).unwrap();

        curator.run(&root.path().join("videos")).unwrap();
        assert_eq!(curator.stats().skipped_no_detection, 3);
    }
}
