//! Frame sources and video discovery.

use super::error::{ExtractionError, Result};
use super::ffmpeg::FfmpegVideoSource;
use super::frame::Frame;
use log::{debug, warn};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv", "webm", "f137"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Sequential, in-order frame stream for one video.
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    /// Native frame rate, if the container reports one.
    fn fps(&self) -> Option<f64>;

    /// `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Frames held in memory; mainly for tests and embedding.
pub struct MemorySource {
    name: Arc<str>,
    fps: Option<f64>,
    frames: VecDeque<Frame>,
}

impl MemorySource {
    pub fn new(name: &str, fps: Option<f64>, frames: Vec<Frame>) -> Self {
        Self {
            name: Arc::from(name),
            fps,
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self
            .frames
            .pop_front()
            .map(|f| f.with_source(Arc::clone(&self.name))))
    }
}

/// A directory of still images played back in file-name order.
pub struct ImageSequenceSource {
    name: Arc<str>,
    fps: f64,
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self> {
        let paths = list_files_with_extensions(dir, IMAGE_EXTENSIONS).map_err(|e| {
            ExtractionError::SourceUnavailable {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        if paths.is_empty() {
            return Err(ExtractionError::SourceUnavailable {
                path: dir.to_path_buf(),
                reason: "no images found".to_string(),
            });
        }
        debug!("Image sequence {}: {} frames", dir.display(), paths.len());
        Ok(Self {
            name: Arc::from(video_name(dir).as_str()),
            fps,
            paths,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let frame_number = self.cursor as u64;
        self.cursor += 1;

        let image = image::open(path)?.to_rgb8();
        let timestamp_ms = if self.fps > 0.0 {
            (frame_number as f64 * 1000.0 / self.fps) as u64
        } else {
            0
        };
        Ok(Some(
            Frame::from_image(image, timestamp_ms, frame_number).with_source(Arc::clone(&self.name)),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    File,
    ImageSequence,
}

/// A discovered input video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub name: String,
    pub path: PathBuf,
    pub kind: VideoKind,
}

impl VideoRef {
    pub fn file(path: &Path) -> Self {
        Self {
            name: video_name(path),
            path: path.to_path_buf(),
            kind: VideoKind::File,
        }
    }

    pub fn image_sequence(dir: &Path) -> Self {
        Self {
            name: video_name(dir),
            path: dir.to_path_buf(),
            kind: VideoKind::ImageSequence,
        }
    }

    /// Opens the default source for this kind of input.
    pub fn open(&self, fallback_fps: f64) -> Result<Box<dyn FrameSource>> {
        match self.kind {
            VideoKind::File => Ok(Box::new(FfmpegVideoSource::open(&self.path)?)),
            VideoKind::ImageSequence => Ok(Box::new(ImageSequenceSource::open(
                &self.path,
                fallback_fps,
            )?)),
        }
    }
}

/// File stem, used as the output name prefix.
pub fn video_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn list_files_with_extensions(dir: &Path, extensions: &[&str]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Finds video files and image-sequence sub-directories directly under `dir`,
/// sorted by path.
pub fn discover_videos(dir: &Path) -> Result<Vec<VideoRef>> {
    let mut videos = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, VIDEO_EXTENSIONS) {
            videos.push(VideoRef::file(&path));
        } else if path.is_dir() {
            match list_files_with_extensions(&path, IMAGE_EXTENSIONS) {
                Ok(images) if !images.is_empty() => videos.push(VideoRef::image_sequence(&path)),
                Ok(_) => {}
                Err(e) => warn!("⚠️ Cannot read {}: {}", path.display(), e),
            }
        }
    }
    videos.sort_by(|a, b| a.path.cmp(&b.path));
    for name in duplicate_names(&videos) {
        warn!(
            "⚠️ Several inputs share the name '{}'; their detections and output files will mix",
            name
        );
    }
    Ok(videos)
}

/// Names used by more than one input, sorted.
pub fn duplicate_names(videos: &[VideoRef]) -> Vec<&str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for video in videos {
        *counts.entry(video.name.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(name, _)| name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_memory_source_labels_frames() {
        let frames = vec![
            Frame::new(2, 2, vec![0u8; 12], 0, 0),
            Frame::new(2, 2, vec![0u8; 12], 33, 1),
        ];
        let mut source = MemorySource::new("clip", Some(30.0), frames);

        let f0 = source.next_frame().unwrap().unwrap();
        assert_eq!(&*f0.source, "clip");
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_discover_and_read_image_sequence() {
        let root = tempfile::tempdir().unwrap();
        let seq = root.path().join("flight_a");
        std::fs::create_dir(&seq).unwrap();
        for i in 0..3u8 {
            RgbImage::from_pixel(8, 6, image::Rgb([i * 50, 0, 0]))
                .save(seq.join(format!("{:03}.png", i)))
                .unwrap();
        }
        std::fs::write(root.path().join("notes.txt"), "x").unwrap();
        std::fs::write(root.path().join("b.mp4"), "").unwrap();
        std::fs::create_dir(root.path().join("empty")).unwrap();

        let videos = discover_videos(root.path()).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].kind, VideoKind::File);
        assert_eq!(videos[0].name, "b");
        assert_eq!(videos[1].kind, VideoKind::ImageSequence);
        assert_eq!(videos[1].name, "flight_a");

        let mut source = ImageSequenceSource::open(&seq, 10.0).unwrap();
        assert_eq!(source.len(), 3);
        let mut seen = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!((frame.width, frame.height), (8, 6));
            seen.push((frame.frame_number, frame.data[0], frame.timestamp.as_millis()));
        }
        assert_eq!(seen, vec![(0, 0, 0), (1, 50, 100), (2, 100, 200)]);
    }

    #[test]
    fn test_duplicate_names_across_kinds() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("clip.mp4"), "").unwrap();
        std::fs::write(root.path().join("clip.avi"), "").unwrap();
        std::fs::write(root.path().join("solo.mkv"), "").unwrap();
        let seq = root.path().join("clip");
        std::fs::create_dir(&seq).unwrap();
        RgbImage::new(2, 2).save(seq.join("0.png")).unwrap();

        let videos = discover_videos(root.path()).unwrap();
        assert_eq!(videos.len(), 4);
        assert_eq!(duplicate_names(&videos), vec!["clip"]);
        assert!(duplicate_names(&videos[3..]).is_empty());
    }

    #[test]
    fn test_image_sequence_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let result = ImageSequenceSource::open(&root.path().join("nope"), 30.0);
        assert!(matches!(result, Err(ExtractionError::SourceUnavailable { .. })));
    }
}
