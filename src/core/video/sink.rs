//! Output channels: accepted, rejected and visualized frames.

use super::error::Result;
use super::frame::Frame;
use image::ImageOutputFormat;
use log::debug;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const ACCEPTED_JPEG_QUALITY: u8 = 95;
const VISUALIZED_JPEG_QUALITY: u8 = 85;
const REJECTED_JPEG_QUALITY: u8 = 70;

/// Caller-assigned identity of an output frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameId {
    pub video: String,
    /// Saved-frame index for accepted/visualized output, read position for
    /// rejected output.
    pub sequence: u64,
    pub frame_number: u64,
}

pub trait FrameSink: Send + Sync {
    fn accept(&self, id: &FrameId, frame: &Frame) -> Result<()>;

    /// `overlay` is present when visualization is enabled.
    fn reject(&self, id: &FrameId, frame: &Frame, overlay: Option<&Frame>) -> Result<()>;

    fn visualize(&self, id: &FrameId, overlay: &Frame) -> Result<()>;
}

/// Writes JPEGs into `<out>`, `<out>_rejected` and `<out>_visualized`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    accepted_dir: PathBuf,
    rejected_dir: PathBuf,
    visualized_dir: PathBuf,
}

fn sibling_dir(dir: &Path, suffix: &str) -> PathBuf {
    match dir.file_name() {
        Some(name) => dir.with_file_name(format!("{}{}", name.to_string_lossy(), suffix)),
        None => dir.join(suffix.trim_start_matches('_')),
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%6f").to_string()
}

impl DirectorySink {
    pub fn create(output_dir: &Path) -> Result<Self> {
        let sink = Self {
            accepted_dir: output_dir.to_path_buf(),
            rejected_dir: sibling_dir(output_dir, "_rejected"),
            visualized_dir: sibling_dir(output_dir, "_visualized"),
        };
        std::fs::create_dir_all(&sink.accepted_dir)?;
        std::fs::create_dir_all(&sink.rejected_dir)?;
        std::fs::create_dir_all(&sink.visualized_dir)?;
        Ok(sink)
    }

    pub fn accepted_dir(&self) -> &Path {
        &self.accepted_dir
    }

    pub fn rejected_dir(&self) -> &Path {
        &self.rejected_dir
    }

    pub fn visualized_dir(&self) -> &Path {
        &self.visualized_dir
    }

    fn write_jpeg(path: &Path, frame: &Frame, quality: u8) -> Result<()> {
        let img = frame.to_image()?;
        let mut writer = BufWriter::new(File::create(path)?);
        img.write_to(&mut writer, ImageOutputFormat::Jpeg(quality))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl FrameSink for DirectorySink {
    fn accept(&self, id: &FrameId, frame: &Frame) -> Result<()> {
        let name = format!("{}_frame_{:05}_{}.jpg", id.video, id.sequence, timestamp());
        Self::write_jpeg(&self.accepted_dir.join(name), frame, ACCEPTED_JPEG_QUALITY)
    }

    fn reject(&self, id: &FrameId, frame: &Frame, overlay: Option<&Frame>) -> Result<()> {
        let name = format!("{}_rejected_{:05}_{}.jpg", id.video, id.sequence, timestamp());
        Self::write_jpeg(
            &self.rejected_dir.join(name),
            overlay.unwrap_or(frame),
            REJECTED_JPEG_QUALITY,
        )
    }

    fn visualize(&self, id: &FrameId, overlay: &Frame) -> Result<()> {
        let name = format!("{}_vis_{:05}_{}.jpg", id.video, id.sequence, timestamp());
        Self::write_jpeg(&self.visualized_dir.join(name), overlay, VISUALIZED_JPEG_QUALITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Accepted,
    Rejected,
    Visualized,
}

#[derive(Debug, Clone)]
pub struct SinkRecord {
    pub channel: Channel,
    pub id: FrameId,
    pub has_overlay: bool,
}

/// Records what each channel received instead of writing files.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, channel: Channel, id: &FrameId, has_overlay: bool) {
        let record = SinkRecord {
            channel,
            id: id.clone(),
            has_overlay,
        };
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn channel(&self, channel: Channel) -> Vec<FrameId> {
        self.records()
            .into_iter()
            .filter(|r| r.channel == channel)
            .map(|r| r.id)
            .collect()
    }
}

impl FrameSink for MemorySink {
    fn accept(&self, id: &FrameId, _frame: &Frame) -> Result<()> {
        self.push(Channel::Accepted, id, false);
        Ok(())
    }

    fn reject(&self, id: &FrameId, _frame: &Frame, overlay: Option<&Frame>) -> Result<()> {
        self.push(Channel::Rejected, id, overlay.is_some());
        Ok(())
    }

    fn visualize(&self, id: &FrameId, _overlay: &Frame) -> Result<()> {
        self.push(Channel::Visualized, id, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(sequence: u64) -> FrameId {
        FrameId {
            video: "clip".to_string(),
            sequence,
            frame_number: sequence * 15,
        }
    }

    #[test]
    fn test_sibling_dirs() {
        assert_eq!(
            sibling_dir(Path::new("out/dataset"), "_rejected"),
            PathBuf::from("out/dataset_rejected")
        );
        assert_eq!(
            sibling_dir(Path::new("dataset/"), "_visualized"),
            PathBuf::from("dataset_visualized")
        );
    }

    #[test]
    fn test_directory_sink_writes_each_channel() {
        let root = tempfile::tempdir().unwrap();
        let sink = DirectorySink::create(&root.path().join("ds")).unwrap();
        let frame = Frame::new(16, 8, vec![128u8; 16 * 8 * 3], 0, 0);

        sink.accept(&id(0), &frame).unwrap();
        sink.visualize(&id(0), &frame).unwrap();
        sink.reject(&id(7), &frame, None).unwrap();

        let names = |dir: &Path| -> Vec<String> {
            std::fs::read_dir(dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        };
        let accepted = names(sink.accepted_dir());
        assert_eq!(accepted.len(), 1);
        assert!(accepted[0].starts_with("clip_frame_00000_"));
        assert!(names(sink.visualized_dir())[0].starts_with("clip_vis_00000_"));
        assert!(names(sink.rejected_dir())[0].starts_with("clip_rejected_00007_"));

        let written = image::open(sink.accepted_dir().join(&accepted[0])).unwrap();
        assert_eq!((written.width(), written.height()), (16, 8));
    }

    #[test]
    fn test_memory_sink_channels() {
        let sink = MemorySink::new();
        let frame = Frame::new(1, 1, vec![0u8; 3], 0, 0);
        sink.accept(&id(1), &frame).unwrap();
        sink.reject(&id(2), &frame, Some(&frame)).unwrap();

        assert_eq!(sink.channel(Channel::Accepted), vec![id(1)]);
        let rejected = sink.records();
        assert!(rejected[1].has_overlay);
        assert!(sink.channel(Channel::Visualized).is_empty());
    }
}
