use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::fs::File;
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
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

/// Parse, expand and validate a YAML config document
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    // An empty document is a valid all-defaults config
    let mut config: Config = if yaml_string.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&yaml_string)?
    };

    config.checkpoint.path = expand_tilde(&config.checkpoint.path);

    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_grouping(&config.grouping, &mut errors);

    if config.pipeline.buffer_limit == 0 {
        errors.push("pipeline.buffer_limit must be greater than zero".to_string());
    }

    if config.checkpoint.enabled && config.checkpoint.path.as_os_str().is_empty() {
        errors.push("checkpoint.path must be set when checkpoint.enabled is true".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_grouping(grouping: &GroupingConfig, errors: &mut Vec<String>) {
    if grouping.session_window.is_zero() {
        errors.push("grouping.session_window must be greater than zero".to_string());
    } else if grouping.session_window > MAX_SESSION_WINDOW {
        errors.push(format!(
            "grouping.session_window cannot exceed {}h, got {:?}",
            MAX_SESSION_WINDOW.as_secs() / 3600,
            grouping.session_window
        ));
    }

    validate_prefix("grouping.cluster_id_prefix", &grouping.cluster_id_prefix, errors);
    validate_prefix("grouping.report_id_prefix", &grouping.report_id_prefix, errors);
}

fn validate_prefix(field: &str, prefix: &str, errors: &mut Vec<String>) {
    if prefix.is_empty() {
        errors.push(format!("{} cannot be empty", field));
    } else if prefix.chars().any(char::is_whitespace) {
        errors.push(format!("{} cannot contain whitespace: '{}'", field, prefix));
    }
}
