//! Configuration file handling for the parley CLI.

use anyhow::{Context, Result};
use parley_chat_client::ClientConfig;
use std::path::{Path, PathBuf};

/// File name of the config inside the config directory.
pub const CONFIG_FILE: &str = "parley.toml";

/// Load the client configuration from a TOML file.
pub async fn load(path: &Path) -> Result<ClientConfig> {
    let contents = tokio::fs::read_to_string(path).await.with_context(|| {
        format!(
            "No config at {}. Run 'parley init' first.",
            path.display()
        )
    })?;
    toml::from_str(&contents).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Save the client configuration, creating parent directories.
pub async fn save(path: &Path, config: &ClientConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create config directory")?;
    }
    let contents = render(config)?;
    tokio::fs::write(path, contents)
        .await
        .context("Failed to save config file")?;
    // The session id identifies a logged-in session
    set_file_permissions_0600(path).await?;
    Ok(())
}

/// Render the configuration as TOML, defaults included.
pub fn render(config: &ClientConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config")
}

/// Resolve the config file path: an explicit one wins over the platform default.
pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => {
            let dirs = directories::ProjectDirs::from("im", "parley", "parley")
                .context("Could not determine home directory")?;
            Ok(dirs.config_dir().join(CONFIG_FILE))
        }
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
