use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::ai::gemini::{DEFAULT_ANALYSIS_MODEL, DEFAULT_API_BASE, DEFAULT_TTS_MODEL};
use crate::ai::{FocusMode, VoiceOption};
use crate::capture::camera::Facing;
use crate::capture::crop::{CROP_FRACTION, THUMB_SIZE};
use crate::conversation::HISTORY_CAP;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    pub api_base: String,
    pub analysis_model: String,
    pub tts_model: String,
    pub focus_mode: FocusMode,
    pub voice: VoiceOption,
    pub speech_enabled: bool,
    pub facing: Facing,
    /// Settle delay between camera release and re-acquire, in milliseconds.
    pub settle_ms: u64,
    pub frame_jpeg_quality: u8,
    /// Crop square side as a fraction of the frame's shorter dimension.
    #[serde(default = "default_crop_fraction")]
    pub crop_fraction: f64,
    /// Output thumbnail resolution (square).
    #[serde(default = "default_thumb_size")]
    pub thumb_size: u32,
    pub history_cap: usize,
}

fn default_crop_fraction() -> f64 {
    CROP_FRACTION
}

fn default_thumb_size() -> u32 {
    THUMB_SIZE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.into(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.into(),
            tts_model: DEFAULT_TTS_MODEL.into(),
            focus_mode: FocusMode::General,
            voice: VoiceOption::Male,
            speech_enabled: true,
            facing: Facing::Back,
            settle_ms: 800,
            frame_jpeg_quality: 80,
            crop_fraction: CROP_FRACTION,
            thumb_size: THUMB_SIZE,
            history_cap: HISTORY_CAP,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist yet.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        toml::from_str(&content).map_err(|e| e.to_string())
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| e.to_string())?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, content).map_err(|e| e.to_string())?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}
