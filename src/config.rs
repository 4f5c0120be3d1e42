//! Configuration types for the media sorter

use crate::media::{DateSource, MediaType, RotationMode};
use crate::time::offset::TimezoneOffset;
use crate::time::resolve::{PHOTO_PRIORITY, VIDEO_PRIORITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Supported image extensions (lowercase)
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "heic", "heif", "webp", "tiff", "tif",
];

/// Supported video extensions (lowercase)
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "m4v", "3gp", "mpg", "mpeg",
];

/// Classify an extension, honoring whether videos are wanted
pub fn media_type_for(ext: &str, include_videos: bool) -> Option<MediaType> {
    let ext_lower = ext.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext_lower.as_str()) {
        Some(MediaType::Photo)
    } else if include_videos && VIDEO_EXTENSIONS.contains(&ext_lower.as_str()) {
        Some(MediaType::Video)
    } else {
        None
    }
}

/// Defaults applied to every record of one media type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDefaults {
    /// Candidate sources in resolution order
    pub date_priority: Vec<DateSource>,

    /// Timezone correction: "none", "exif" or an offset like "+09:00"
    #[serde(default)]
    pub timezone_offset: TimezoneOffset,

    #[serde(default)]
    pub rotation_mode: RotationMode,
}

impl MediaDefaults {
    pub fn photo() -> Self {
        Self {
            date_priority: PHOTO_PRIORITY.to_vec(),
            timezone_offset: TimezoneOffset::None,
            rotation_mode: RotationMode::None,
        }
    }

    pub fn video() -> Self {
        Self {
            date_priority: VIDEO_PRIORITY.to_vec(),
            timezone_offset: TimezoneOffset::None,
            rotation_mode: RotationMode::None,
        }
    }
}

/// Burst detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstConfig {
    /// Largest gap in seconds between consecutive shots of one burst (inclusive)
    pub max_interval_secs: f64,

    /// Smallest number of shots that counts as a burst
    pub min_count: usize,

    /// Assign burst groups during scan; when false they are only assigned
    /// right before processing
    #[serde(default = "default_true")]
    pub assign_on_scan: bool,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            max_interval_secs: 3.0,
            min_count: 3,
            assign_on_scan: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Engine configuration, immutable for the lifetime of a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of worker threads (0 = auto)
    #[serde(default)]
    pub threads: usize,

    /// JPEG quality used when a rotated image is re-encoded
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    #[serde(default)]
    pub burst: BurstConfig,

    #[serde(default = "MediaDefaults::photo")]
    pub photo: MediaDefaults,

    #[serde(default = "MediaDefaults::video")]
    pub video: MediaDefaults,
}

fn default_jpeg_quality() -> u8 {
    92
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 0, // Auto-detect
            jpeg_quality: default_jpeg_quality(),
            burst: BurstConfig::default(),
            photo: MediaDefaults::photo(),
            video: MediaDefaults::video(),
        }
    }
}

impl Config {
    /// Defaults for the given media type
    pub fn defaults_for(&self, media_type: MediaType) -> &MediaDefaults {
        match media_type {
            MediaType::Photo => &self.photo,
            MediaType::Video => &self.video,
        }
    }

    /// Check values a file could hold but the engine cannot use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.burst.max_interval_secs.is_finite() && self.burst.max_interval_secs >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "burst.max_interval_secs must be a non-negative number, got {}",
                self.burst.max_interval_secs
            )));
        }
        if self.burst.min_count < 2 {
            return Err(ConfigError::Invalid(format!(
                "burst.min_count must be at least 2, got {}",
                self.burst.min_count
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        for (name, defaults) in [("photo", &self.photo), ("video", &self.video)] {
            if defaults.date_priority.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{name}.date_priority must list at least one source"
                )));
            }
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Media Sorter Configuration File
# This file uses TOML format (https://toml.io)

# Number of worker threads (0 = auto-detect)
threads = 0

# JPEG quality for images re-encoded after rotation (1-100)
jpeg_quality = 92

[burst]
# Largest gap in seconds between two shots of the same burst (inclusive)
max_interval_secs = 3.0
# Smallest number of shots that counts as a burst
min_count = 3
# Assign burst numbers during scan (false = only when processing)
assign_on_scan = true

[photo]
# Date sources in priority order: exif, file_name, file_created, file_modified
date_priority = ["exif", "file_name", "file_created", "file_modified"]
# Timezone correction: "none", "exif" or an offset such as "+09:00"
timezone_offset = "none"
# Rotation: "none", "exif", "90", "180" or "270"
rotation_mode = "none"

[video]
date_priority = ["file_modified", "file_name", "file_created"]
timezone_offset = "none"
rotation_mode = "none"
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
