use crate::loudness::DecibelScale;
use crate::peak::DEFAULT_CELEBRATION_THRESHOLD;
use crate::session::SessionConfig;
use crate::{DEFAULT_BUFFER_SIZE_EXP, DEFAULT_REFRESH_DURATION, SAVE_DIR};
use serde::{Serialize, Deserialize};
use std::error::Error;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SAVE_NAME: &str = "meter_settings.json";

/// Accepted buffer size exponents, 32 to 32768 samples.
pub const BUFFER_SIZE_EXP_RANGE: RangeInclusive<usize> = 5..=15;

/// The exponent to use for a requested one. Out of range values fall back to the default.
pub fn checked_buffer_size_exp(exp: usize) -> usize {
    if BUFFER_SIZE_EXP_RANGE.contains(&exp) {
        exp
    } else {
        tracing::warn!(
            "Buffer size exponent {} is outside {}..={}, using {}",
            exp,
            BUFFER_SIZE_EXP_RANGE.start(),
            BUFFER_SIZE_EXP_RANGE.end(),
            DEFAULT_BUFFER_SIZE_EXP
        );
        DEFAULT_BUFFER_SIZE_EXP
    }
}

/// Samples per window for a buffer size exponent, after range checking.
pub fn buffer_size_samples(exp: usize) -> usize {
    1 << checked_buffer_size_exp(exp)
}

#[derive(Debug)]
pub enum SettingsError {
    NoSavePath,
    NotFound,
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::NoSavePath => write!(f, "Could not determine the settings save path"),
            SettingsError::NotFound => write!(f, "Settings file not found"),
            SettingsError::Io(e) => write!(f, "Failed to access settings file, error: {}", e),
            SettingsError::Json(e) => write!(f, "Failed to (de)serialize settings, error: {}", e),
        }
    }
}

impl Error for SettingsError {}

/// Meter settings that will be saved to a file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MeterSettingsSave {
    // Buffer size is 2 to the power of this value
    pub buffer_size: usize,
    pub refresh_ms: u64,
    pub scale: DecibelScale,
    pub celebration_threshold: f32,
    pub input_device: Option<String>,
}

impl Default for MeterSettingsSave {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE_EXP,
            refresh_ms: DEFAULT_REFRESH_DURATION.as_millis() as u64,
            scale: DecibelScale::default(),
            celebration_threshold: DEFAULT_CELEBRATION_THRESHOLD,
            input_device: None,
        }
    }
}

impl MeterSettingsSave {
    pub fn get_save_path() -> Option<PathBuf> {
        Some(homedir::my_home().ok()??.join(SAVE_DIR).join(SAVE_NAME))
    }

    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&Self::get_save_path().ok_or(SettingsError::NoSavePath)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(SettingsError::Json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SettingsError::NotFound),
            Err(e) => Err(SettingsError::Io(e)),
        }
    }

    /// Saved settings, or defaults if there are none. Problems other than a missing file are logged.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(settings) => settings,
            Err(SettingsError::NotFound) => {
                tracing::info!("No saved settings, using defaults");
                Self::default()
            },
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::get_save_path().ok_or(SettingsError::NoSavePath)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(SettingsError::Io)?;
        }
        let data = serde_json::to_string_pretty(self).map_err(SettingsError::Json)?;
        std::fs::write(path, data).map_err(SettingsError::Io)
    }

    pub fn buffer_size_samples(&self) -> usize {
        buffer_size_samples(self.buffer_size)
    }

    pub fn refresh_duration(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            buffer_len: self.buffer_size_samples(),
            scale: self.scale,
            celebration_threshold: self.celebration_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path(test: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("rs_loudness_meter_{}_{}", test, crate::unique_time_id()))
            .join(SAVE_NAME)
    }

    #[test]
    fn defaults_describe_a_1024_sample_gauge_meter() {
        let settings = MeterSettingsSave::default();
        assert_eq!(settings.buffer_size_samples(), 1024);
        assert_eq!(settings.refresh_duration(), DEFAULT_REFRESH_DURATION);

        let config = settings.session_config();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn out_of_range_buffer_sizes_use_the_default() {
        for exp in [0, 4, 16, 40, 64, usize::MAX] {
            assert_eq!(checked_buffer_size_exp(exp), DEFAULT_BUFFER_SIZE_EXP);
            let settings = MeterSettingsSave { buffer_size: exp, ..Default::default() };
            assert_eq!(settings.buffer_size_samples(), 1024);
        }

        assert_eq!(buffer_size_samples(5), 32);
        assert_eq!(buffer_size_samples(15), 32768);
    }

    #[test]
    fn saved_settings_load_back() {
        let path = temp_settings_path("roundtrip");
        let settings = MeterSettingsSave {
            buffer_size: 11,
            refresh_ms: 33,
            scale: DecibelScale::NegativeDbfs,
            celebration_threshold: 42.5,
            input_device: Some("USB Mic".to_string()),
        };

        settings.save_to(&path).unwrap();
        assert_eq!(MeterSettingsSave::load_from(&path).unwrap(), settings);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let path = temp_settings_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "scale": "negative-dbfs" }"#).unwrap();

        let loaded = MeterSettingsSave::load_from(&path).unwrap();
        assert_eq!(loaded.scale, DecibelScale::NegativeDbfs);
        assert_eq!(loaded.buffer_size, DEFAULT_BUFFER_SIZE_EXP);
        assert_eq!(loaded.celebration_threshold, DEFAULT_CELEBRATION_THRESHOLD);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn load_errors_are_distinguished() {
        let path = temp_settings_path("errors");
        assert!(matches!(MeterSettingsSave::load_from(&path), Err(SettingsError::NotFound)));

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(MeterSettingsSave::load_from(&path), Err(SettingsError::Json(_))));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
