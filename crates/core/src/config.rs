use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{FormCheckError, Result},
    geometry::DEFAULT_VIDEO_DIMENSIONS,
    render::ColorMode,
    types::FrameDimensions,
};

pub const BACKEND_URL_ENV: &str = "FORMCHECK_BACKEND_URL";

/// Allowed submission interval, i.e. 3 to 5 analyses per second.
pub const MIN_ANALYZE_INTERVAL_MS: u64 = 200;
pub const MAX_ANALYZE_INTERVAL_MS: u64 = 333;

/// How responses that resolve out of submission order are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrdering {
    /// Apply a response only if it was submitted after the last applied one.
    #[default]
    Generation,
    /// Apply every response as it arrives; a slow early response can overwrite a newer pose.
    Arrival,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormCheckConfig {
    pub backend_url: String,
    pub analyze_interval_ms: u64,
    pub render_interval_ms: u64,
    pub jpeg_quality: u8,
    pub snapshot_quality: u8,
    pub min_keypoints: usize,
    pub default_video_width: u32,
    pub default_video_height: u32,
    pub skeleton_view_width: u32,
    pub skeleton_view_height: u32,
    /// Color keypoints by body part, or everything by the form-quality tier.
    pub color_mode: ColorMode,
    pub history_capacity: Option<usize>,
    pub response_ordering: ResponseOrdering,
    pub request_timeout_ms: u64,
}

impl Default for FormCheckConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000".to_string(),
            analyze_interval_ms: 300,
            render_interval_ms: 16,
            jpeg_quality: 90,
            snapshot_quality: 70,
            min_keypoints: 10,
            default_video_width: 640,
            default_video_height: 480,
            skeleton_view_width: 300,
            skeleton_view_height: 400,
            color_mode: ColorMode::Anatomical,
            history_capacity: Some(50),
            response_ordering: ResponseOrdering::Generation,
            request_timeout_ms: 5000,
        }
    }
}

impl FormCheckConfig {
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| FormCheckError::Config {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, path)
    }

    /// Explicit path, else the user config file when present, else defaults.
    /// `FORMCHECK_BACKEND_URL` overrides whatever URL the file carried.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };

        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend_url = url;
            }
        }

        Ok(config)
    }

    pub fn analyze_interval(&self) -> Duration {
        Duration::from_millis(
            self.analyze_interval_ms
                .clamp(MIN_ANALYZE_INTERVAL_MS, MAX_ANALYZE_INTERVAL_MS),
        )
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(1))
    }

    /// Assumed video size until the device reports one. Zero entries fall back to 640x480.
    pub fn default_video_dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.default_video_width, self.default_video_height)
            .or(DEFAULT_VIDEO_DIMENSIONS)
    }

    pub fn skeleton_view_dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.skeleton_view_width, self.skeleton_view_height)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("formcheck").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = FormCheckConfig::from_toml_str(
            "backend_url = \"http://pose.local:8080/\"\nresponse_ordering = \"arrival\"\n",
            Path::new("inline.toml"),
        )
        .unwrap();

        assert_eq!(config.response_ordering, ResponseOrdering::Arrival);
        assert_eq!(config.min_keypoints, 10);
        assert_eq!(config.history_capacity, Some(50));
        assert_eq!(config.backend_url, "http://pose.local:8080/");
    }

    #[test]
    fn test_video_fallback_and_color_mode_from_file() {
        let config = FormCheckConfig::from_toml_str(
            "default_video_width = 1280\ndefault_video_height = 720\ncolor_mode = \"form_quality\"\n",
            Path::new("inline.toml"),
        )
        .unwrap();
        assert_eq!(config.default_video_dimensions(), FrameDimensions::new(1280, 720));
        assert_eq!(config.color_mode, ColorMode::FormQuality);

        let defaults = FormCheckConfig::default();
        assert_eq!(defaults.default_video_dimensions(), DEFAULT_VIDEO_DIMENSIONS);
        assert_eq!(defaults.color_mode, ColorMode::Anatomical);

        let zeroed = FormCheckConfig {
            default_video_width: 0,
            ..FormCheckConfig::default()
        };
        assert_eq!(zeroed.default_video_dimensions(), DEFAULT_VIDEO_DIMENSIONS);
    }

    #[test]
    fn test_analyze_interval_is_clamped() {
        let mut config = FormCheckConfig::default();
        assert_eq!(config.analyze_interval(), Duration::from_millis(300));

        config.analyze_interval_ms = 50;
        assert_eq!(config.analyze_interval(), Duration::from_millis(200));

        config.analyze_interval_ms = 1000;
        assert_eq!(config.analyze_interval(), Duration::from_millis(333));
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let err = FormCheckConfig::from_toml_str("min_keypoints = \"ten\"", Path::new("bad.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
