use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub directory: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Candidate encodings, tried in order until one decodes the whole file
    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
}

fn default_extension() -> String {
    ".log".to_string()
}

pub fn default_encodings() -> Vec<String> {
    ["utf-8", "latin-1", "iso-8859-1", "cp1252", "windows-1252", "cp850"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// A line must contain at least one of these before any pattern is tried
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
    #[serde(default = "default_confirmation_marker")]
    pub confirmation_marker: String,
    #[serde(default = "default_resolution_marker")]
    pub resolution_marker: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            markers: default_markers(),
            confirmation_marker: default_confirmation_marker(),
            resolution_marker: default_resolution_marker(),
        }
    }
}

fn default_markers() -> Vec<String> {
    vec!["CFN".to_string(), "OK".to_string(), "acknowledged".to_string()]
}

fn default_confirmation_marker() -> String {
    "CFN".to_string()
}

fn default_resolution_marker() -> String {
    "OK".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    1000
}
