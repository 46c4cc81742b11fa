//! Stored configuration and client construction.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use zen_core::{AccessToken, Api, ApiConfig, BaseUrl, Client, TokenPlacement};
use zen_http::ReqwestTransport;

use crate::cli::ConnectionArgs;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Stored configuration data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredConfig {
    pub url: String,
    pub token: String,
}

/// Get the config file path.
fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "zen").context("Could not determine config directory")?;

    let config_dir = dirs.config_dir();
    fs::create_dir_all(config_dir).context("Failed to create config directory")?;

    Ok(config_dir.join("config.json"))
}

/// Save the configuration to disk.
pub fn save(config: &StoredConfig) -> Result<PathBuf> {
    let path = config_path()?;
    let json = serde_json::to_string_pretty(config)?;

    fs::write(&path, &json).context("Failed to write config file")?;

    // Set restrictive permissions (Unix only)
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(&path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&path, perms)?;
    }

    Ok(path)
}

/// Load the configuration from disk.
pub fn load() -> Result<Option<StoredConfig>> {
    let path = config_path()?;

    if !path.exists() {
        return Ok(None);
    }

    let json = fs::read_to_string(&path).context("Failed to read config file")?;
    let stored = serde_json::from_str(&json).context("Invalid config file")?;
    Ok(Some(stored))
}

/// Resolve the base URL: flag or environment first, then the stored value.
pub fn base_url(conn: &ConnectionArgs, stored: Option<&StoredConfig>) -> Result<BaseUrl> {
    match conn.url.as_deref().or(stored.map(|s| s.url.as_str())) {
        Some(url) => BaseUrl::new(url).context("Invalid instance URL"),
        None => Ok(BaseUrl::default()),
    }
}

/// Build an API client from flags, environment and stored configuration.
pub fn connect(conn: &ConnectionArgs) -> Result<Client> {
    let stored = load()?;
    let base_url = base_url(conn, stored.as_ref())?;

    let mut config = ApiConfig::new(base_url);
    let token = conn
        .token
        .clone()
        .or_else(|| stored.as_ref().map(|s| s.token.clone()));
    match token {
        Some(token) => config = config.with_token(AccessToken::new(token)),
        None => tracing::debug!("no access token configured, requests are anonymous"),
    }
    if conn.token_in_query {
        config = config.with_token_placement(TokenPlacement::Query);
    }

    let transport = ReqwestTransport::builder()
        .user_agent(concat!("zen/", env!("ZEN_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    Ok(Client::new(Api::new(config, transport)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_url_wins_over_stored() {
        let conn = ConnectionArgs {
            url: Some("https://sandbox.zenodo.org".into()),
            ..Default::default()
        };
        let stored = StoredConfig {
            url: "https://zenodo.org".into(),
            token: "t".into(),
        };
        let url = base_url(&conn, Some(&stored)).unwrap();
        assert_eq!(url.host(), Some("sandbox.zenodo.org"));
    }

    #[test]
    fn default_url_is_zenodo() {
        let url = base_url(&ConnectionArgs::default(), None).unwrap();
        assert_eq!(url, BaseUrl::zenodo());
    }

    #[test]
    fn rejects_plain_http_remote() {
        let conn = ConnectionArgs {
            url: Some("http://zenodo.org".into()),
            ..Default::default()
        };
        assert!(base_url(&conn, None).is_err());
    }
}
