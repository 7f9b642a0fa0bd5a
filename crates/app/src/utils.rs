//! Settings file handling.

use anyhow::{Context, Result};
use shared::settings::ChatSettings;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Get the default config file path
pub fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "LC Waikiki", "onesearch")
        .map(|proj| proj.config_dir().join("settings.json"))
}

/// Load settings from an explicit file. Unlike the default location, a
/// missing or broken explicit file is an error.
pub fn load_settings_from(path: &Path) -> Result<ChatSettings> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("could not read settings file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid settings file {}", path.display()))
}

/// Load settings from disk or return defaults
pub fn load_settings_or_default() -> ChatSettings {
    match config_path() {
        Some(path) => load_settings_or_default_from(&path),
        None => ChatSettings::default(),
    }
}

/// Settings from `path` when it holds a valid file, otherwise defaults. A
/// broken file is logged and skipped.
fn load_settings_or_default_from(path: &Path) -> ChatSettings {
    if !path.exists() {
        return ChatSettings::default();
    }
    match load_settings_from(path) {
        Ok(settings) => {
            debug!(path = %path.display(), "loaded settings");
            settings
        }
        Err(e) => {
            warn!(error = %format!("{:#}", e), "ignoring settings file, using defaults");
            ChatSettings::default()
        }
    }
}

pub fn load_settings(explicit: Option<&Path>) -> Result<ChatSettings> {
    match explicit {
        Some(path) => load_settings_from(path),
        None => Ok(load_settings_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::settings::ProfileKind;
    use std::io::Write;

    #[test]
    fn test_load_explicit_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"profile":"api","bind_address":"0.0.0.0:8080","completion":{{"temperature":0.2}}}}"#
        )
        .unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.profile, ProfileKind::Api);
        assert_eq!(settings.bind_address, "0.0.0.0:8080");
        assert!((settings.completion.temperature - 0.2).abs() < 1e-6);
        assert_eq!(settings.completion.model, "gpt-4o");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(err.to_string().contains("could not read settings file"));
    }

    #[test]
    fn test_explicit_invalid_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(load_settings(Some(file.path())).is_err());
    }

    #[test]
    fn test_default_location_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_or_default_from(&dir.path().join("settings.json"));
        assert_eq!(settings.profile, ProfileKind::Office);
        assert_eq!(settings.bind_address, "127.0.0.1:3000");
    }

    #[test]
    fn test_default_location_broken_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"profile": "sales""#).unwrap();

        let settings = load_settings_or_default_from(file.path());
        assert_eq!(settings.profile, ProfileKind::Office);
        assert_eq!(settings.completion.model, "gpt-4o");
    }

    #[test]
    fn test_default_location_valid_file_is_used() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"profile":"search"}}"#).unwrap();
        assert_eq!(load_settings_or_default_from(file.path()).profile, ProfileKind::Search);
    }
}
