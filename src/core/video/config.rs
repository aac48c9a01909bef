//! JSON5 配置文件加载

use super::error::Result;
use super::pipeline::ExtractionConfig;
use log::info;
use std::path::Path;

/// Parses a JSON5 document; missing keys take their defaults.
pub fn parse_config(text: &str) -> Result<ExtractionConfig> {
    let config: ExtractionConfig = json5::from_str(text)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<ExtractionConfig> {
    let text = std::fs::read_to_string(path)?;
    let config = parse_config(&text)?;
    info!("⚙️ Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::error::ExtractionError;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = parse_config(
            r#"{
                // 只抓远景
                max_coverage_percent: 5,
                interval_seconds: 1.0,
                detection: { allowed_classes: [4] },
            }"#,
        )
        .unwrap();

        assert_eq!(config.max_coverage_percent, 5.0);
        assert_eq!(config.interval_seconds, 1.0);
        assert_eq!(config.detection.allowed_classes, vec![4]);
        assert_eq!(config.detection.min_confidence, 0.15);
        assert_eq!(config.similarity_threshold, 0.92);
        assert_eq!(config.window_capacity, 5);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(parse_config("{}").unwrap(), ExtractionConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = parse_config("{ interval_seconds: -1 }");
        assert!(matches!(result, Err(ExtractionError::InvalidConfig(_))));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            parse_config("{ max_coverage_percent: "),
            Err(ExtractionError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curator.json5");
        std::fs::write(&path, "{ resize_width: 640, max_frames: 100 }").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.resize_width, Some(640));
        assert_eq!(config.max_frames, Some(100));

        assert!(matches!(
            load_config(&dir.path().join("missing.json5")),
            Err(ExtractionError::Io(_))
        ));
    }
}
