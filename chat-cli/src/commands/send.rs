//! Send a message to a dialog.

use anyhow::{Context, Result};
use parley_chat_client::ClientConfig;
use parley_chat_types::{DialogId, FileAttachment};
use std::path::{Path, PathBuf};

use super::{connect_once, ensure_sent};

/// What to send.
#[derive(Debug)]
pub enum Payload {
    /// A text message, chunked if long.
    Text(String),
    /// A file read from disk.
    File(PathBuf),
}

enum Outgoing {
    Text(String),
    File(FileAttachment),
}

/// Run the send command.
pub async fn run(config: ClientConfig, dialog: &str, payload: Payload) -> Result<()> {
    let dialog_id = DialogId::new(dialog);

    // Read and validate before touching the network
    let outgoing = match payload {
        Payload::Text(text) if text.trim().is_empty() => {
            anyhow::bail!("Nothing to send: message is blank")
        }
        Payload::Text(text) => Outgoing::Text(text),
        Payload::File(path) => Outgoing::File(read_attachment(&path).await?),
    };

    let client = connect_once(config).await?;
    let result = match outgoing {
        Outgoing::Text(text) => client
            .send_text(&dialog_id, &text)
            .await
            .map(|deliveries| (deliveries, "text".to_string())),
        Outgoing::File(file) => {
            let name = file.name.clone();
            client
                .send_file(&dialog_id, file)
                .await
                .map(|delivery| (vec![delivery], name))
        }
    };
    client.shutdown().await;

    let (deliveries, what) = result?;
    let count = deliveries.len();
    for delivery in deliveries {
        ensure_sent(delivery, "Message")?;
    }

    println!("Sent {} ({} frame(s)) to dialog {}", what, count, dialog_id);
    Ok(())
}

/// Load a file from disk as an attachment.
async fn read_attachment(path: &Path) -> Result<FileAttachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("File path has no usable file name")?;
    Ok(FileAttachment::from_bytes(name, mime_type_for(path), &bytes))
}

/// Guess a MIME type from the file extension.
fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
