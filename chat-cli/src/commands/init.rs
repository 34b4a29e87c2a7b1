//! Write a starter config file.

use anyhow::Result;
use parley_chat_client::ClientConfig;
use std::path::Path;

use crate::config;

/// Run the init command.
pub async fn run(
    path: &Path,
    server_url: &str,
    user_id: &str,
    session_id: Option<&str>,
    force: bool,
) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    let mut client_config = ClientConfig::new(server_url, user_id);
    if let Some(session_id) = session_id {
        client_config = client_config.with_session(session_id);
    }
    config::save(path, &client_config).await?;

    println!("Config written to {}", path.display());
    println!();
    println!("  Server: {}", client_config.server_url);
    println!("  User:   {}", client_config.user_id);
    if let Some(session_id) = &client_config.session_id {
        println!("  Session: {}", session_id);
    }
    println!();
    println!("Next: parley listen");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_chat_types::SessionId;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_writes_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parley.toml");
        run(&path, "ws://localhost:9000", "u-1", Some("s-1"), false)
            .await
            .unwrap();

        let loaded = config::load(&path).await.unwrap();
        assert_eq!(loaded.server_url, "ws://localhost:9000");
        assert_eq!(loaded.session_id, Some(SessionId::new("s-1")));
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parley.toml");

        run(&path, "ws://a", "u-1", None, false).await.unwrap();
        assert!(run(&path, "ws://b", "u-2", None, false).await.is_err());

        run(&path, "ws://b", "u-2", None, true).await.unwrap();
        let loaded = config::load(&path).await.unwrap();
        assert_eq!(loaded.server_url, "ws://b");
    }
}
