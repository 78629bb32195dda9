//! Configuration data model and hierarchical YAML parser.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! Parses the schema documented for the CLI's `-c` flag using `serde` +
//! `serde_yaml2`, the crates the teacher's own `cameras.yaml` loader
//! already depends on. Deliberately light on tests: the config parser is
//! ambient plumbing, not the educative core of this crate.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Up to this many camera blocks may be configured; a further block is a
/// parse error.
pub const MAX_CAMERAS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("too many cameras configured: {found} (max {MAX_CAMERAS})")]
    TooManyCameras { found: usize },
    #[error("no cameras configured")]
    NoCameras,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputSection {
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputSection {
    format: String,
    url: String,
    #[serde(default)]
    options: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct BasicDetectSection {
    threshold: f64,
    #[serde(default)]
    thumbnail: Option<PathBuf>,
    #[serde(default)]
    logfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CameraSection {
    input: InputSection,
    #[serde(rename = "output-live")]
    output_live: OutputSection,
    #[serde(rename = "output-motion")]
    output_motion: OutputSection,
    #[serde(rename = "basic-detect")]
    basic_detect: BasicDetectSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RootSection {
    cameras: HashMap<String, CameraSection>,
}

/// Muxer target: format name, (possibly strftime-patterned) URL, and
/// opaque options forwarded to the muxer.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: String,
    pub url: String,
    pub options: HashMap<String, String>,
}

/// One configured camera, fully resolved from the file (URLs are not yet
/// strftime-expanded; that happens at output-open time).
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub name: String,
    pub input_url: String,
    pub output_live: OutputConfig,
    pub output_motion: OutputConfig,
    pub detect_threshold: f64,
    pub detect_thumbnail: Option<PathBuf>,
    pub detect_logfile: Option<PathBuf>,
}

/// Loads and validates a camera configuration file.
pub fn load(path: &Path) -> Result<Vec<CameraConfig>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    parse(&text, path)
}

fn parse(text: &str, path: &Path) -> Result<Vec<CameraConfig>, ConfigError> {
    let root: RootSection = serde_yaml2::from_str(text)
        .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), reason: e.to_string() })?;

    if root.cameras.is_empty() {
        return Err(ConfigError::NoCameras);
    }
    if root.cameras.len() > MAX_CAMERAS {
        return Err(ConfigError::TooManyCameras { found: root.cameras.len() });
    }

    let mut cameras: Vec<CameraConfig> = root
        .cameras
        .into_iter()
        .map(|(name, section)| CameraConfig {
            name,
            input_url: section.input.url,
            output_live: OutputConfig {
                format: section.output_live.format,
                url: section.output_live.url,
                options: section.output_live.options,
            },
            output_motion: OutputConfig {
                format: section.output_motion.format,
                url: section.output_motion.url,
                options: section.output_motion.options,
            },
            detect_threshold: section.basic_detect.threshold,
            detect_thumbnail: section.basic_detect.thumbnail,
            detect_logfile: section.basic_detect.logfile,
        })
        .collect();

    cameras.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(cameras)
}
