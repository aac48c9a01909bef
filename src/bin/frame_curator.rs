//! frame-curator - turn a folder of videos into a curated frame dataset

use clap::Parser;
use frame_curator::api::video::DatasetCurator;
use frame_curator::core::video::{load_config, ExtractionConfig, ExtractionError};
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding video files or image-sequence sub-directories.
    #[arg(long, short, default_value = "videos")]
    input: PathBuf,
    /// Accepted frames go here; `<output>_rejected` and `<output>_visualized` are created beside it.
    #[arg(long, short, default_value = "dataset")]
    output: PathBuf,
    /// JSON5 config file. Flags below override its values.
    #[arg(long, env = "FRAME_CURATOR_CONFIG")]
    config: Option<PathBuf>,
    /// Precomputed detections (JSON keyed by video name, then frame number).
    #[arg(long)]
    detections: Option<PathBuf>,
    /// Reject frames whose largest detection covers more than this percent.
    #[arg(long)]
    max_coverage: Option<f64>,
    /// Histogram correlation above which a frame counts as a duplicate.
    #[arg(long)]
    similarity: Option<f64>,
    /// Seconds between evaluated frames.
    #[arg(long)]
    interval: Option<f64>,
    /// Resize frames to this width before detection.
    #[arg(long)]
    resize_width: Option<u32>,
    /// Stop a video after this many saved frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Skip writing annotated frames.
    #[arg(long)]
    no_visualization: bool,
    /// Only keep far targets (coverage limit 5%).
    #[arg(long)]
    distant_only: bool,
    /// Videos processed in parallel; 0 uses every CPU.
    #[arg(long)]
    jobs: Option<usize>,
    /// Also write the final statistics as JSON.
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

impl Args {
    fn build_config(&self) -> Result<ExtractionConfig, ExtractionError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None if self.distant_only => ExtractionConfig::for_distant_targets(),
            None => ExtractionConfig::default(),
        };

        if self.distant_only {
            config.max_coverage_percent = ExtractionConfig::for_distant_targets().max_coverage_percent;
        }
        if let Some(v) = self.max_coverage {
            config.max_coverage_percent = v;
        }
        if let Some(v) = self.similarity {
            config.similarity_threshold = v;
        }
        if let Some(v) = self.interval {
            config.interval_seconds = v;
        }
        if let Some(v) = self.resize_width {
            config.resize_width = Some(v);
        }
        if let Some(v) = self.max_frames {
            config.max_frames = Some(v);
        }
        if let Some(v) = self.jobs {
            config.jobs = v;
        }
        if self.no_visualization {
            config.save_visualization = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), ExtractionError> {
    frame_curator::init_logging();
    let args = Args::parse();
    let config = args.build_config()?;

    info!("📁 Input:  {}", args.input.display());
    info!("📁 Output: {}", args.output.display());
    info!(
        "⚙️ Max coverage {}%, similarity {}, interval {}s",
        config.max_coverage_percent, config.similarity_threshold, config.interval_seconds
    );

    let mut curator = DatasetCurator::create(config, &args.output)?;
    match &args.detections {
        Some(path) => curator = curator.with_detections_file(path)?,
        None => warn!("⚠️ No --detections given, frames cannot be classified"),
    }

    curator.run(&args.input)?;

    let summary = curator.summary();
    println!("{}", summary);
    if let Some(path) = &args.stats_json {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        info!("Stats written to {}", path.display());
    }
    Ok(())
}
