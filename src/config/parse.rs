use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, unexpanded_env_vars};
use crate::source::encoding::TextEncoding;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let config = parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })?;

    Ok(config)
}

/// Parse and validate a config from YAML text.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let unexpanded = unexpanded_env_vars(yaml_string);
    if unexpanded.is_empty() {
        return Ok(());
    }

    let error_msg = if unexpanded.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=/path/to/directory\n\
             2. Replace $env{{{0}}} in the config file with an actual path",
            unexpanded[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             Set them or replace the references in the config file with actual paths",
            unexpanded.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_paths(config: &mut Config) {
    config.source.directory = expand_tilde(&config.source.directory);
    config.storage.path = expand_tilde(&config.storage.path);
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_source(&config.source, &mut errors);
    validate_parser(&config.parser, &mut errors);

    if config.storage.batch_size == 0 {
        errors.push("storage.batch_size must be greater than zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_source(source: &SourceConfig, errors: &mut Vec<String>) {
    if source.extension.trim_start_matches('.').is_empty() {
        errors.push("source.extension cannot be empty".to_string());
    }

    if source.encodings.is_empty() {
        errors.push("source.encodings must list at least one encoding".to_string());
    }

    for (i, label) in source.encodings.iter().enumerate() {
        if label.parse::<TextEncoding>().is_err() {
            errors.push(format!(
                "source.encodings[{}]: unsupported encoding '{}'",
                i, label
            ));
        }
    }
}

fn validate_parser(parser: &ParserConfig, errors: &mut Vec<String>) {
    if parser.markers.is_empty() {
        errors.push("parser.markers must contain at least one marker".to_string());
    }

    for (i, marker) in parser.markers.iter().enumerate() {
        if marker.is_empty() {
            errors.push(format!("parser.markers[{}]: marker cannot be empty", i));
        }
    }

    if parser.confirmation_marker.is_empty() {
        errors.push("parser.confirmation_marker cannot be empty".to_string());
    }

    if parser.resolution_marker.is_empty() {
        errors.push("parser.resolution_marker cannot be empty".to_string());
    }
}
