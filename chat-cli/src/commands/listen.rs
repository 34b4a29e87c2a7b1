//! Stay connected and print what happens until Ctrl-C.

use anyhow::Result;
use parley_chat_client::{ClientConfig, ClientEvent};
use parley_chat_core::ConnectionEvent;
use parley_chat_types::{Dialog, DialogId, Message};
use tokio::sync::broadcast::error::RecvError;

use super::build_client;

const PREVIEW_CHARS: usize = 60;

/// Run the listen command.
pub async fn run(config: ClientConfig) -> Result<()> {
    let url = config.server_url.clone();
    let client = build_client(config);
    let mut events = client.subscribe();
    let mut connection = client.connection_events();

    client.connect();
    println!("Listening on {} (Ctrl-C to stop)", url);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            event = connection.recv() => match event {
                Ok(event) => println!("{}", describe_connection(&event)),
                Err(RecvError::Lagged(n)) => tracing::warn!("Missed {} connection events", n),
                Err(RecvError::Closed) => break Ok(()),
            },
            event = events.recv() => match event {
                Ok(ClientEvent::ForcedLogout { reason }) => {
                    break Err(anyhow::anyhow!("Logged out by the server: {}", reason));
                }
                Ok(event) => {
                    let dialog = dialog_of(&event).and_then(|id| client.dialog(id));
                    println!("{}", describe_event(&event, dialog.as_ref()));
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("Missed {} chat events", n),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    client.shutdown().await;
    outcome
}

fn dialog_of(event: &ClientEvent) -> Option<&DialogId> {
    match event {
        ClientEvent::DialogChanged(id) => Some(id),
        ClientEvent::Notification { dialog_id, .. } => Some(dialog_id),
        _ => None,
    }
}

/// One line for a connection event.
fn describe_connection(event: &ConnectionEvent) -> String {
    match event {
        ConnectionEvent::Opened => "* connected".to_string(),
        ConnectionEvent::Lost {
            reason,
            attempt,
            retry_in,
        } => format!(
            "* connection lost ({}), retry #{} in {:.1}s",
            reason,
            attempt,
            retry_in.as_secs_f64()
        ),
        ConnectionEvent::CircuitOpen { failures, cooldown } => format!(
            "* {} failures in a row, pausing for {}s",
            failures,
            cooldown.as_secs()
        ),
        ConnectionEvent::Disconnected => "* disconnected".to_string(),
    }
}

/// One line for a chat event, using the dialog it refers to when known.
fn describe_event(event: &ClientEvent, dialog: Option<&Dialog>) -> String {
    match (event, dialog) {
        (ClientEvent::Notification { message_id, sound, .. }, Some(dialog)) => {
            let body = dialog
                .message(message_id)
                .map(preview)
                .unwrap_or_default();
            let bell = if *sound { " (sound)" } else { "" };
            format!(
                "! {}: {}{}",
                dialog.counterpart.display_name(),
                body,
                bell
            )
        }
        (ClientEvent::Notification { dialog_id, .. }, None) => {
            format!("! new message in {}", dialog_id)
        }
        (ClientEvent::DialogChanged(_), Some(dialog)) => {
            let mut line = format!("[{}]", dialog.counterpart.display_name());
            if dialog.counterpart.is_typing {
                line.push_str(" typing...");
            } else if let Some(last) = &dialog.last_message {
                line.push(' ');
                line.push_str(&preview(last));
            }
            if dialog.unread_count > 0 {
                line.push_str(&format!(" ({} unread)", dialog.unread_count));
            }
            line
        }
        (ClientEvent::DialogChanged(id), None) => format!("[{}] changed", id),
        (ClientEvent::DialogRemoved(id), _) => format!("[{}] removed", id),
        (ClientEvent::SessionRemoved(id), _) => format!("- session {} ended", id),
        (ClientEvent::ForcedLogout { reason }, _) => format!("- logged out: {}", reason),
    }
}

/// Short single-line rendering of a message body.
fn preview(message: &Message) -> String {
    match (&message.text, &message.file) {
        (Some(text), _) => {
            let line = text.lines().next().unwrap_or_default();
            if line.chars().count() > PREVIEW_CHARS || line.len() < text.len() {
                let cut: String = line.chars().take(PREVIEW_CHARS).collect();
                format!("{}...", cut)
            } else {
                line.to_string()
            }
        }
        (None, Some(file)) => format!("[file {}]", file.name),
        (None, None) => String::new(),
    }
}
