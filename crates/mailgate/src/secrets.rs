//! Mailbox credential resolution.
//!
//! A secret can be given in three ways, resolved in priority order:
//!
//! 1. **Direct value** - for local testing (`password: "..."`)
//! 2. **File reference** - Docker/Kubernetes secret mounts (`passwordFile: /run/secrets/imap`)
//! 3. **Env var reference** - function hosts and CI (`passwordEnvVar: MAILGATE_IMAP_PASSWORD`)

use std::fs;

use secrecy::SecretString;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// The configured places a secret may come from. Empty strings count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn new(direct: Option<&'a str>, file: Option<&'a str>, env_var: Option<&'a str>) -> Self {
        Self {
            direct: non_empty(direct),
            file: non_empty(file),
            env_var: non_empty(env_var),
        }
    }

    /// True if at least one source is configured.
    pub fn is_configured(&self) -> bool {
        self.direct.is_some() || self.file.is_some() || self.env_var.is_some()
    }

    /// Resolves the secret from the highest-priority configured source.
    ///
    /// Lower-priority sources are not consulted once a higher one is configured,
    /// even if reading it fails.
    pub fn resolve(&self) -> Result<SecretString> {
        if let Some(value) = self.direct {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = self.file {
            let expanded = expand_home(path);
            return fs::read_to_string(&expanded)
                .map(|content| SecretString::from(content.trim().to_string()))
                .map_err(|source| SecretError::FileReadError {
                    path: expanded,
                    source,
                });
        }

        if let Some(name) = self.env_var {
            return match std::env::var(name) {
                // Env vars written by deployment tooling often carry a trailing newline.
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Expands a leading `~` to the user's home directory (`~user` is not supported).
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
