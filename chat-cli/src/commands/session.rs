//! Terminate one of the local user's sessions.

use anyhow::Result;
use parley_chat_client::ClientConfig;
use parley_chat_types::SessionId;

use super::{connect_once, ensure_sent};

/// Run the destroy-session command.
pub async fn destroy(config: ClientConfig, session_id: &str) -> Result<()> {
    let session_id = SessionId::new(session_id);
    if config.session_id.as_ref() == Some(&session_id) {
        println!("Note: {} is this client's own session", session_id);
    }

    let client = connect_once(config).await?;
    let result = client.destroy_session(&session_id).await;
    client.shutdown().await;

    ensure_sent(result?, "Session teardown")?;
    println!("Requested teardown of session {}", session_id);
    Ok(())
}
