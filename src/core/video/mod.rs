pub mod config;
pub mod deduplicator;
pub mod detection;
pub mod distance;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod manager;
pub mod pipeline;
pub mod policy;
pub mod sink;
pub mod source;
pub mod stats;
pub mod visualize;
pub mod window;

pub use config::{load_config, parse_config};
pub use deduplicator::{AcceptedWindow, ColorHistogram, SimilarityDeduplicator};
pub use detection::{
    BoundingBox, Detection, DetectionFilter, MockDetector, NullDetector, ObjectDetector,
    PrecomputedDetector,
};
pub use distance::{Classification, DistanceCategory, DistanceClassifier, DistanceThresholds};
pub use error::{ExtractionError, Result};
pub use frame::Frame;
pub use manager::{DefaultSourceProvider, FrameExtractorManager, SourceProvider};
pub use pipeline::{ExtractionConfig, FrameExtractor, VideoSummary};
pub use policy::{Decision, FrameSelectionPolicy, Outcome, PolicyConfig};
pub use sink::{DirectorySink, FrameId, FrameSink, MemorySink};
pub use source::{
    discover_videos, duplicate_names, FrameSource, ImageSequenceSource, MemorySource, VideoRef,
};
pub use stats::{ExtractionStats, SharedStats, StatsSummary};
pub use visualize::{BoxOverlayRenderer, OverlayRenderer};
pub use window::RecencyWindow;
