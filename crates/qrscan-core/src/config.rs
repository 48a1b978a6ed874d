//! 配置文件加载（TOML）
use serde::Deserialize;
use std::path::Path;

use crate::error::Result;
use crate::options::{FilterOptions, PipelineOptions};

/// 顶层配置；缺省的段或字段取默认值
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    pub filter: FilterOptions,
    pub pipeline: PipelineOptions,
}

impl ScannerConfig {
    pub fn from_toml_str(txt: &str) -> Result<Self> {
        let cfg: ScannerConfig = toml::from_str(txt)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.pipeline.validate()
    }
}

/// 从 TOML 文件加载并校验
pub fn load_config(path: &Path) -> Result<ScannerConfig> {
    let txt = std::fs::read_to_string(path)?;
    ScannerConfig::from_toml_str(&txt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(ScannerConfig::from_toml_str("").unwrap(), ScannerConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ScannerConfig::from_toml_str(
            "[filter]\nallow_empty_text = false\n\n[pipeline]\ndrop_when_busy = true\n",
        )
        .unwrap();
        assert!(!cfg.filter.allow_empty_text);
        assert_eq!(cfg.filter.region_min, 0.25);
        assert_eq!(cfg.filter.region_max, 0.75);
        assert!(cfg.pipeline.drop_when_busy);
        assert_eq!(cfg.pipeline.queue_capacity, 1);
    }

    #[test]
    fn invalid_region_is_rejected() {
        let err = ScannerConfig::from_toml_str("[filter]\nregion_min = 0.9\nregion_max = 0.1\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn unknown_keys_are_a_parse_error() {
        let err = ScannerConfig::from_toml_str("[filter]\nregion = 0.5\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrscan.toml");
        std::fs::write(&path, "[pipeline]\nqueue_capacity = 4\n").unwrap();
        assert_eq!(load_config(&path).unwrap().pipeline.queue_capacity, 4);
        assert!(matches!(load_config(&dir.path().join("missing.toml")), Err(Error::Io(_))));
    }
}
