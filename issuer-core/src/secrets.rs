//! Secrets management for issuer
//!
//! The GitHub token is kept apart from configuration so a config file can be
//! shared. The secrets file lives at `~/.config/issuer/secrets.toml` and must
//! have restrictive permissions (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variable (GITHUB_TOKEN)
//! 2. Secrets file (~/.config/issuer/secrets.toml)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    pub github: GitHubSecrets,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubSecrets {
    /// Personal access token with `repo` and `project` scopes
    pub token: Option<String>,
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns empty secrets if the file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_secrets_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path).map_err(Error::Io)?.permissions().mode();

            // Readable by group or others
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        if let Some(token) = secrets.github.token.as_mut() {
            *token = token.trim().to_string();
        }

        Ok(secrets)
    }

    /// Returns `~/.config/issuer/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("issuer").join("secrets.toml"))
    }

    /// GitHub token, preferring the GITHUB_TOKEN environment variable
    pub fn github_token(&self) -> Option<String> {
        Self::token_from(std::env::var("GITHUB_TOKEN").ok(), self)
    }

    fn token_from(env: Option<String>, secrets: &Secrets) -> Option<String> {
        if let Some(token) = env.map(|t| t.trim().to_string()) {
            if !token.is_empty() {
                debug!("Using GitHub token from GITHUB_TOKEN environment variable");
                return Some(token);
            }
        }

        match secrets.github.token.as_deref() {
            Some(token) if !token.is_empty() => {
                debug!("Using GitHub token from secrets file");
                Some(token.to_string())
            }
            _ => None,
        }
    }

    /// Write an empty secrets file at the default location with mode 0600
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;
        Self::write_template(&path)?;
        Ok(path)
    }

    /// Write an empty secrets file at `path`, refusing to overwrite one
    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }

        let template = r#"# issuer secrets
# Keep this file private (chmod 600)

[github]
# Personal access token: https://github.com/settings/tokens
# Needs the repo and project scopes
token = ""
"#;

        std::fs::write(path, template).map_err(Error::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms).map_err(Error::Io)?;
        }

        warn!(path = %path.display(), "Created secrets template, add your token to it");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn with_token(token: &str) -> Secrets {
        Secrets {
            github: GitHubSecrets {
                token: Some(token.to_string()),
            },
        }
    }

    #[test]
    fn test_parse_secrets() {
        let secrets: Secrets = toml::from_str("[github]\ntoken = \"ghp_abc\"").unwrap();
        assert_eq!(secrets.github.token, Some("ghp_abc".to_string()));
    }

    #[test]
    fn test_env_token_wins() {
        let secrets = with_token("from_file");
        assert_eq!(
            Secrets::token_from(Some(" from_env ".to_string()), &secrets),
            Some("from_env".to_string())
        );
        assert_eq!(
            Secrets::token_from(Some("  ".to_string()), &secrets),
            Some("from_file".to_string())
        );
        assert_eq!(Secrets::token_from(None, &with_token("")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[github]\ntoken = \"test\"").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = Secrets::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("insecure permissions"));
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_permissions_accepted() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[github]\ntoken = \"  ghp_test \"").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();

        let secrets = Secrets::load_from_file(file.path()).unwrap();
        assert_eq!(secrets.github.token, Some("ghp_test".to_string()));
    }

    #[test]
    fn test_template_loads_and_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issuer").join("secrets.toml");

        Secrets::write_template(&path).unwrap();
        let secrets = Secrets::load_from_file(&path).unwrap();
        assert_eq!(Secrets::token_from(None, &secrets), None);

        let err = Secrets::write_template(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
