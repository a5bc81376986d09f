mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse, normalize and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse config")?;

    prepare(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./vidi.toml",
        "~/.config/vidi/config.toml",
        "/etc/vidi/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    prepare(&mut config);
    Ok(config)
}

fn prepare(config: &mut Config) {
    config.s3.prefix.upload = trim_prefix(&config.s3.prefix.upload);
    config.s3.prefix.watch = trim_prefix(&config.s3.prefix.watch);
    config.watch.base_url = config.watch.base_url.trim_end_matches('/').to_string();
}

/// Strip leading and trailing slashes from an object prefix.
pub fn trim_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}

/// Every violation in `config`, in section order.
pub fn config_violations(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();

    if config.videoapi.endpoint.trim().is_empty() {
        errors.push("videoapi.endpoint cannot be empty".to_string());
    }
    if config.videoapi.token.is_empty() {
        errors.push("videoapi.token cannot be empty".to_string());
    }
    if config.videoapi.timeout_secs == 0 {
        errors.push("videoapi.timeout_secs must be greater than 0".to_string());
    }

    if config.storage.backend == StorageBackend::S3 {
        if config.s3.bucket.is_empty() {
            errors.push("s3.bucket cannot be empty".to_string());
        }
        if config.s3.endpoint.is_empty() {
            errors.push("s3.endpoint cannot be empty".to_string());
        }
    }
    if trim_prefix(&config.s3.prefix.upload).is_empty() {
        errors.push("s3.prefix.upload cannot be empty".to_string());
    }
    if trim_prefix(&config.s3.prefix.watch).is_empty() {
        errors.push("s3.prefix.watch cannot be empty".to_string());
    }

    if config.processor.segment_duration == 0 {
        errors.push("processor.segment_duration must be greater than 0".to_string());
    }
    if config.processor.video_check_period == 0 {
        errors.push("processor.video_check_period must be greater than 0".to_string());
    }

    errors
}

/// Fail with every violation in `config`
pub fn validate_config(config: &Config) -> Result<()> {
    let errors = config_violations(config);
    if !errors.is_empty() {
        anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }

    if config.s3.access_key.is_empty() && config.storage.backend == StorageBackend::S3 {
        tracing::warn!("s3.access_key is empty; relying on the default credential chain");
    }

    Ok(())
}
