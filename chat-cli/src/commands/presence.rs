//! Announce online/offline presence.

use anyhow::Result;
use parley_chat_client::ClientConfig;

use super::{connect_once, ensure_sent};

/// Run the presence command.
pub async fn run(config: ClientConfig, online: bool) -> Result<()> {
    let client = connect_once(config).await?;
    let result = client.toggle_online_status(online).await;
    client.shutdown().await;

    ensure_sent(result?, "Presence update")?;
    println!("Presence set to {}", if online { "online" } else { "offline" });
    Ok(())
}
