use std::path::{Path, PathBuf};

use regex::Regex;
use secrecy::SecretString;

use crate::config::schema::{Config, MailConfig};
use crate::error::ConfigError;
use crate::secrets::SecretSource;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "MAILGATE_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// `.json` files are JSON; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// `$MAILGATE_CONFIG`, else `<config dir>/mailgate/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("mailgate").join("config.yaml"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content, ConfigFormat::from_path(path))
}

pub fn load_config_from_str(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let mut config: Config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };

    normalize_config(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Resolves the mailbox password from the configured source.
pub fn resolve_mail_password(mail: &MailConfig) -> Result<SecretString, ConfigError> {
    password_source(mail).resolve().map_err(ConfigError::from)
}

fn password_source(mail: &MailConfig) -> SecretSource<'_> {
    SecretSource::new(
        mail.password.as_deref(),
        mail.password_file.as_deref(),
        mail.password_env_var.as_deref(),
    )
}

fn normalize_config(config: &mut Config) {
    config.mail.host = config.mail.host.trim().to_string();
    config.storage.container_name = config.storage.container_name.trim().to_lowercase();
    config.queue.topic_name = config.queue.topic_name.trim().to_string();
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.mail.host.is_empty() {
        return Err(validation("mail.host must not be empty"));
    }
    if config.mail.port == 0 {
        return Err(validation("mail.port must not be 0"));
    }
    if config.mail.username.trim().is_empty() {
        return Err(validation("mail.username must not be empty"));
    }
    if config.mail.folder.trim().is_empty() {
        return Err(validation("mail.folder must not be empty"));
    }
    if !password_source(&config.mail).is_configured() {
        return Err(validation(
            "mail needs one of password, passwordFile or passwordEnvVar",
        ));
    }

    if config.storage.connection_string.trim().is_empty() {
        return Err(validation("storage.connectionString must not be empty"));
    }
    validate_container_name(&config.storage.container_name)?;

    if config.queue.connection_string.trim().is_empty() {
        return Err(validation("queue.connectionString must not be empty"));
    }
    if config.queue.topic_name.is_empty() {
        return Err(validation("queue.topicName must not be empty"));
    }
    if config.queue.topic_name.contains(['/', '\\']) || config.queue.topic_name == ".." {
        return Err(validation(format!(
            "queue.topicName '{}' must be a plain name",
            config.queue.topic_name
        )));
    }

    Ok(())
}

/// 3-63 characters of lowercase letters, digits and single hyphens, starting
/// and ending with a letter or digit.
fn validate_container_name(name: &str) -> Result<(), ConfigError> {
    let pattern = Regex::new(r"^[a-z0-9][a-z0-9-]{1,61}[a-z0-9]$")
        .map_err(|e| validation(format!("Invalid container name pattern: {}", e)))?;

    if !pattern.is_match(name) || name.contains("--") {
        return Err(validation(format!(
            "storage.containerName '{}' must be 3-63 characters of lowercase letters, digits and single hyphens",
            name
        )));
    }
    Ok(())
}
