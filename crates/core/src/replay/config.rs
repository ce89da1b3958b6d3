use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::source::domain::dataset_client::DatasetCredentials;
use crate::source::infrastructure::file_source::EndPolicy;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid mode '{0}': must be 'local' or 'dataset'")]
    UnknownMode(String),
    #[error("{field} is required for {mode} mode")]
    MissingField {
        field: &'static str,
        mode: &'static str,
    },
    #[error("fps must be positive, got {0}")]
    InvalidFps(String),
}

/// Configuration exactly as the host framework hands it over: every field
/// optional, mode-specific validity unchecked. [`RawConfig::validate`]
/// converts it into the tagged [`Mode`] so nothing downstream ever touches
/// a nullable field.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawConfig {
    pub mode: Option<String>,

    // Local mode fields
    pub video_path: Option<String>,
    pub loop_video: Option<bool>,

    // Shared: overrides the detected rate (local) or the default (dataset)
    pub fps: Option<f64>,

    // Dataset mode fields
    pub api_key: Option<String>,
    pub api_key_id: Option<String>,
    pub organization_id: Option<String>,
    pub dataset_id: Option<String>,
}

/// A validated replay configuration. Exactly one mode is active at a time.
#[derive(Clone, Debug, PartialEq)]
pub enum Mode {
    Local {
        video_path: PathBuf,
        end_policy: EndPolicy,
        fps_override: Option<f64>,
    },
    Dataset {
        credentials: DatasetCredentials,
        fps_override: Option<f64>,
    },
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Local { .. } => "local",
            Mode::Dataset { .. } => "dataset",
        }
    }
}

impl RawConfig {
    pub fn validate(&self) -> Result<Mode, ConfigError> {
        let fps_override = match self.fps {
            Some(fps) if fps <= 0.0 => return Err(ConfigError::InvalidFps(fps.to_string())),
            other => other,
        };

        let mode = self.mode.as_deref().unwrap_or("local");
        match mode {
            "local" => {
                let video_path = required(self.video_path.as_deref(), "video_path", "local")?;
                let end_policy = if self.loop_video.unwrap_or(true) {
                    EndPolicy::Loop
                } else {
                    EndPolicy::Freeze
                };
                Ok(Mode::Local {
                    video_path: PathBuf::from(video_path),
                    end_policy,
                    fps_override,
                })
            }
            "dataset" => {
                let credentials = DatasetCredentials {
                    api_key: required(self.api_key.as_deref(), "api_key", "dataset")?.to_string(),
                    api_key_id: required(self.api_key_id.as_deref(), "api_key_id", "dataset")?
                        .to_string(),
                    organization_id: required(
                        self.organization_id.as_deref(),
                        "organization_id",
                        "dataset",
                    )?
                    .to_string(),
                    dataset_id: required(self.dataset_id.as_deref(), "dataset_id", "dataset")?
                        .to_string(),
                };
                Ok(Mode::Dataset {
                    credentials,
                    fps_override,
                })
            }
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
    mode: &'static str,
) -> Result<&'a str, ConfigError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField { field, mode }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn local_config() -> RawConfig {
        RawConfig {
            video_path: Some("/videos/run.mp4".to_string()),
            ..Default::default()
        }
    }

    fn dataset_config() -> RawConfig {
        RawConfig {
            mode: Some("dataset".to_string()),
            api_key: Some("key".to_string()),
            api_key_id: Some("key-id".to_string()),
            organization_id: Some("org".to_string()),
            dataset_id: Some("ds".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_defaults_to_local() {
        let mode = local_config().validate().unwrap();
        assert_eq!(mode.name(), "local");
    }

    #[test]
    fn test_local_defaults_to_looping() {
        let Mode::Local { end_policy, .. } = local_config().validate().unwrap() else {
            panic!("expected local mode");
        };
        assert_eq!(end_policy, EndPolicy::Loop);
    }

    #[test]
    fn test_loop_video_false_selects_freeze() {
        let mut config = local_config();
        config.loop_video = Some(false);
        let Mode::Local { end_policy, .. } = config.validate().unwrap() else {
            panic!("expected local mode");
        };
        assert_eq!(end_policy, EndPolicy::Freeze);
    }

    #[test]
    fn test_local_without_video_path_fails() {
        let config = RawConfig::default();
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::MissingField {
                field: "video_path",
                mode: "local"
            }
        );
    }

    #[test]
    fn test_empty_video_path_fails() {
        let mut config = local_config();
        config.video_path = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[rstest]
    #[case::api_key(|c: &mut RawConfig| c.api_key = None, "api_key")]
    #[case::api_key_id(|c: &mut RawConfig| c.api_key_id = None, "api_key_id")]
    #[case::organization_id(|c: &mut RawConfig| c.organization_id = None, "organization_id")]
    #[case::dataset_id(|c: &mut RawConfig| c.dataset_id = None, "dataset_id")]
    fn test_dataset_requires_every_credential(
        #[case] strip: fn(&mut RawConfig),
        #[case] field: &'static str,
    ) {
        let mut config = dataset_config();
        strip(&mut config);
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::MissingField {
                field,
                mode: "dataset"
            }
        );
    }

    #[test]
    fn test_valid_dataset_config() {
        let Mode::Dataset { credentials, .. } = dataset_config().validate().unwrap() else {
            panic!("expected dataset mode");
        };
        assert_eq!(credentials.organization_id, "org");
        assert_eq!(credentials.dataset_id, "ds");
    }

    #[test]
    fn test_unknown_mode_fails() {
        let mut config = local_config();
        config.mode = Some("streaming".to_string());
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::UnknownMode("streaming".to_string())
        );
    }

    #[rstest]
    #[case(0.0)]
    #[case(-5.0)]
    fn test_non_positive_fps_fails(#[case] fps: f64) {
        let mut config = local_config();
        config.fps = Some(fps);
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidFps(_)
        ));
    }

    #[test]
    fn test_raw_config_deserializes_from_host_json() {
        let config: RawConfig = serde_json::from_str(
            r#"{"mode": "dataset", "api_key": "k", "api_key_id": "ki",
                "organization_id": "o", "dataset_id": "d", "fps": 10}"#,
        )
        .unwrap();
        let mode = config.validate().unwrap();
        assert_eq!(mode.name(), "dataset");
    }
}
