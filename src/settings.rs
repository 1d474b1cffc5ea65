use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

const SETTINGS_FILE_NAME: &str = "settings.json";
const CONFIG_DIR_NAME: &str = "voxchat";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// WebSocket endpoint for the transcription stream.
    pub ws_url: String,

    /// Base URL for the chat query API.
    pub api_base_url: String,

    /// Base URL for the voice service (catalog, synthesis, audio files).
    pub voice_base_url: String,

    /// Request speaker diarization with each audio segment.
    pub diarization: bool,

    /// Segments are force-closed once they reach this length.
    pub max_segment_ms: u64,

    /// Consecutive voiced 30 ms frames required before a segment opens.
    pub vad_start_frames: usize,

    /// Consecutive silent 30 ms frames required before a segment closes.
    pub vad_end_silence_frames: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:5001".to_string(),
            api_base_url: "http://localhost:8000".to_string(),
            voice_base_url: "http://localhost:5001".to_string(),
            diarization: false,
            max_segment_ms: 10_000,
            vad_start_frames: 2,
            vad_end_silence_frames: 10,
        }
    }
}

fn settings_path() -> Result<PathBuf, String> {
    let dir = dirs::config_dir().ok_or("Could not determine config directory")?;
    Ok(dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE_NAME))
}

impl AppSettings {
    /// Load settings from the config directory, falling back to defaults
    /// when the file is missing or unreadable. Environment variables
    /// override the file in all cases.
    pub fn load() -> AppSettings {
        let mut settings = match settings_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                warn!("Settings: {}", e);
                AppSettings::default()
            }
        };
        settings.apply_env_overrides();
        settings
    }

    pub fn load_from(path: &Path) -> AppSettings {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Settings: failed to parse {:?}: {}", path, e);
                    AppSettings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
            Err(e) => {
                warn!("Settings: failed to read {:?}: {}", path, e);
                AppSettings::default()
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("VOXCHAT_WS_URL") {
            self.ws_url = url;
        }
        if let Ok(url) = std::env::var("VOXCHAT_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Ok(url) = std::env::var("VOXCHAT_VOICE_BASE_URL") {
            self.voice_base_url = url;
        }
    }

    pub fn save(&self) -> Result<(), String> {
        let path = settings_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory {:?}: {}", parent, e))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Serialize settings: {}", e))?;

        // Stage the new contents in a sibling temp file and rename it over the
        // target, so a crash mid-write never leaves a truncated settings.json.
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &contents)
            .map_err(|e| format!("Write temp settings {:?}: {}", tmp_path, e))?;

        // Unix renames replace the destination in place; Windows refuses to
        // rename over an existing file, so clear it there first.
        if cfg!(windows) {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        return Err(format!("Remove existing settings file {:?}: {}", path, e));
                    }
                }
            }
        }

        std::fs::rename(&tmp_path, path)
            .map_err(|e| format!("Rename temp settings {:?} to {:?}: {}", tmp_path, path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load_from(&dir.path().join("absent.json"));
        assert_eq!(settings.ws_url, "ws://localhost:5001");
        assert_eq!(settings.max_segment_ms, 10_000);
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{not json").unwrap();
        let settings = AppSettings::load_from(&path);
        assert_eq!(settings.api_base_url, "http://localhost:8000");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{"ws_url": "ws://example:9000"}"#).unwrap();
        let settings = AppSettings::load_from(&path);
        assert_eq!(settings.ws_url, "ws://example:9000");
        assert_eq!(settings.vad_start_frames, 2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);

        let mut settings = AppSettings::default();
        settings.diarization = true;
        settings.max_segment_ms = 5_000;
        settings.save_to(&path).unwrap();

        let reloaded = AppSettings::load_from(&path);
        assert!(reloaded.diarization);
        assert_eq!(reloaded.max_segment_ms, 5_000);
    }

    #[test]
    fn test_save_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);

        AppSettings::default().save_to(&path).unwrap();
        let mut updated = AppSettings::default();
        updated.ws_url = "ws://other:5002".to_string();
        updated.save_to(&path).unwrap();

        let reloaded = AppSettings::load_from(&path);
        assert_eq!(reloaded.ws_url, "ws://other:5002");
    }
}
