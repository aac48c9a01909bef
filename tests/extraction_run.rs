use frame_curator::api::video::DatasetCurator;
use frame_curator::core::video::{
    ExtractionConfig, FrameExtractorManager, MemorySink, MockDetector, NullDetector,
};
use image::{Rgb, RgbImage};
use serde_json::json;
use std::path::Path;

const W: u32 = 64;
const H: u32 = 48;

fn write_sequence(dir: &Path, colors: &[[u8; 3]]) {
    std::fs::create_dir_all(dir).unwrap();
    for (i, rgb) in colors.iter().enumerate() {
        RgbImage::from_pixel(W, H, Rgb(*rgb))
            .save(dir.join(format!("{:04}.png", i)))
            .unwrap();
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Two sequences: `flight_a` has six distinct colours, `flight_b` repeats one.
fn setup(root: &Path) {
    let videos = root.join("videos");
    write_sequence(
        &videos.join("flight_a"),
        &[
            [0, 255, 0],
            [37, 218, 91],
            [74, 181, 182],
            [111, 144, 17],
            [148, 107, 108],
            [185, 70, 199],
        ],
    );
    write_sequence(&videos.join("flight_b"), &[[120, 120, 120]; 4]);
    // 无法解码的视频文件应被跳过
    std::fs::write(videos.join("broken.mp4"), b"").unwrap();

    let small = json!([{ "bbox": [4, 4, 12, 10], "confidence": 0.5, "class_id": 4, "class_name": "airplane" }]);
    let big = json!([{ "bbox": [0, 0, 40, 40], "confidence": 0.9, "class_id": 4, "class_name": "airplane" }]);
    let noise = json!([{ "bbox": [0, 0, 60, 40], "confidence": 0.9, "class_id": 0, "class_name": "person" }]);
    let detections = json!({
        "flight_a": { "0": small, "1": small, "2": small, "3": big, "4": small, "5": small },
        "flight_b": { "0": small, "1": small, "2": small, "3": noise },
    });
    std::fs::write(root.join("detections.json"), detections.to_string()).unwrap();

    std::fs::write(
        root.join("curator.json5"),
        "{\n  // 每帧都评估\n  interval_seconds: 1.0,\n  fallback_fps: 1.0,\n}\n",
    )
    .unwrap();
}

#[test]
fn test_full_run_writes_dataset() {
    let root = tempfile::tempdir().unwrap();
    setup(root.path());

    let out = root.path().join("dataset");
    let curator = DatasetCurator::from_config_file(&root.path().join("curator.json5"), &out)
        .unwrap()
        .with_detections_file(&root.path().join("detections.json"))
        .unwrap();

    let summaries = curator.run(&root.path().join("videos")).unwrap();
    assert_eq!(summaries.len(), 2);

    let stats = curator.stats();
    assert_eq!(stats.total_frames_considered, 10);
    assert_eq!(stats.saved, 6);
    assert_eq!(stats.skipped_too_close, 1);
    assert_eq!(stats.skipped_similar, 2);
    assert_eq!(stats.skipped_no_detection, 1);
    assert_eq!(stats.distance_far, 8);
    assert_eq!(stats.distance_close, 1);
    assert!(stats.is_consistent());

    let [accepted, rejected, visualized] = curator.output_dirs();
    assert_eq!(accepted, out);
    assert_eq!(count_files(&accepted), 6);
    assert_eq!(count_files(&rejected), 1);
    assert_eq!(count_files(&visualized), 6);
    assert!(root.path().join("dataset_rejected").is_dir());

    let summary = serde_json::to_value(curator.summary()).unwrap();
    assert_eq!(summary["saved"], 6);
    let efficiency = summary["efficiency"].as_f64().unwrap();
    assert!((efficiency - 0.6).abs() < 1e-9);
}

#[test]
fn test_without_detector_nothing_is_saved() {
    let root = tempfile::tempdir().unwrap();
    setup(root.path());

    let curator = DatasetCurator::from_config_file(
        &root.path().join("curator.json5"),
        &root.path().join("dataset"),
    )
    .unwrap();
    curator.run(&root.path().join("videos")).unwrap();

    let stats = curator.stats();
    assert_eq!(stats.saved, 0);
    assert_eq!(stats.skipped_no_detection, 10);
    assert_eq!(count_files(&root.path().join("dataset")), 0);
}

#[test]
fn test_parallel_directory_run() {
    let root = tempfile::tempdir().unwrap();
    setup(root.path());

    let config = ExtractionConfig {
        interval_seconds: 1.0,
        fallback_fps: 1.0,
        jobs: 0,
        ..Default::default()
    };
    let manager = FrameExtractorManager::new(config).unwrap();
    let detector = MockDetector::always(vec![]);
    let sink = MemorySink::new();

    let summaries = manager
        .process_directory(&root.path().join("videos"), &detector, &sink)
        .unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(manager.get_stats().frames_read, 10);

    let empty = tempfile::tempdir().unwrap();
    let none = manager
        .process_directory(empty.path(), &NullDetector, &sink)
        .unwrap();
    assert!(none.is_empty());
}
