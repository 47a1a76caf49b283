//! Application configuration, read from JSON. Every field has a default so
//! partial files are accepted.

use crate::render::RendererConfig;
use crate::render::surface::ContextAttributes;
use crate::session::FrameFaultPolicy;
use crate::xr::{ReferenceSpaceType, SessionMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub reference_space: ReferenceSpaceType,
    pub fault_policy: FrameFaultPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub context: ContextAttributes,
    pub renderer: RendererConfig,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::debug!("[config] loaded {}", path.display());
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.session.mode.is_immersive() {
            return Err(ConfigError::Invalid(format!(
                "session mode {} cannot host an immersive render loop",
                self.session.mode
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_yields_defaults() {
        let config = AppConfig::from_json_str("{}").expect("defaults parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.session.mode, SessionMode::ImmersiveAr);
        assert_eq!(config.session.reference_space, ReferenceSpaceType::Local);
        assert_eq!(config.session.fault_policy, FrameFaultPolicy::EndSession);
    }

    #[test]
    fn partial_sections_override_fields() {
        let config = AppConfig::from_json_str(
            r#"{
                "session": { "reference_space": "local-floor", "fault_policy": "skip-frame" },
                "renderer": { "auto_clear": true }
            }"#,
        )
        .expect("partial config parses");

        assert_eq!(config.session.reference_space, ReferenceSpaceType::LocalFloor);
        assert_eq!(config.session.fault_policy, FrameFaultPolicy::SkipFrame);
        assert!(config.renderer.auto_clear);
        assert!(config.renderer.alpha);
    }

    #[test]
    fn inline_mode_is_rejected() {
        let err = AppConfig::from_json_str(r#"{ "session": { "mode": "inline" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "context": {{ "antialias": false }} }}"#).expect("write config");

        let config = AppConfig::load(file.path()).expect("config loads");
        assert!(!config.context.antialias);
        assert!(config.context.xr_compatible);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.json");
        match AppConfig::load(&path) {
            Err(ConfigError::Read { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_through_pretty_json() {
        let config = AppConfig::default();
        let json = config.to_json_pretty().expect("serializes");
        assert_eq!(AppConfig::from_json_str(&json).expect("parses"), config);
    }
}
