use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse settings from {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Could not determine configuration directory")]
    NoConfigDir,
}

/// Flow graph layout spacing, in canvas units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub column_spacing: f32,
    pub row_spacing: f32,
    pub turn_spacing: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            column_spacing: 250.0,
            row_spacing: 90.0,
            turn_spacing: 360.0,
        }
    }
}

/// Recording replay behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Ignore recorded chunk timing
    pub fast: bool,
    /// Upper bound for a single inter-chunk delay
    pub max_delay_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            fast: false,
            max_delay_ms: 2000,
        }
    }
}

/// Engine settings loaded from ~/.config/artifact-stream/settings.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Language for fenced code blocks without a tag
    pub default_code_language: String,
    /// Show file declarations as one-line placeholders in the transcript
    pub collapse_artifacts_in_transcript: bool,
    pub layout: LayoutSettings,
    pub playback: PlaybackSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_code_language: "text".to_string(),
            collapse_artifacts_in_transcript: true,
            layout: LayoutSettings::default(),
            playback: PlaybackSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Load settings from an explicit file. Errors are returned, not masked.
    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings from the default location, falling back to defaults
    /// when the file is missing or broken.
    pub fn load() -> Self {
        match load_settings_from_disk() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!("Failed to load settings: {err}");
                EngineSettings::default()
            }
        }
    }
}

pub fn config_dir() -> Result<PathBuf, SettingsError> {
    let base = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
    Ok(base.join("artifact-stream"))
}

fn load_settings_from_disk() -> Result<EngineSettings, SettingsError> {
    let settings_path = config_dir()?.join("settings.json");

    if !settings_path.exists() {
        return Ok(EngineSettings::default());
    }

    EngineSettings::from_path(&settings_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "layout": { "row_spacing": 42.0 } }"#).unwrap();

        assert_eq!(settings.default_code_language, "text");
        assert!(settings.collapse_artifacts_in_transcript);
        assert_eq!(settings.layout.row_spacing, 42.0);
        assert_eq!(settings.layout.column_spacing, 250.0);
        assert_eq!(settings.playback, PlaybackSettings::default());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "default_code_language": "plaintext", "playback": {{ "fast": true }} }}"#
        )
        .unwrap();

        let settings = EngineSettings::from_path(file.path()).unwrap();
        assert_eq!(settings.default_code_language, "plaintext");
        assert!(settings.playback.fast);
        assert_eq!(settings.playback.max_delay_ms, 2000);
    }

    #[test]
    fn test_from_path_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = EngineSettings::from_path(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineSettings::from_path(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
