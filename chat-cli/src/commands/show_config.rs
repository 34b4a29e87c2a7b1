//! Print the effective configuration.

use anyhow::Result;
use parley_chat_client::ClientConfig;
use std::path::Path;

use crate::config;

/// Run the config command.
pub fn run(path: &Path, client_config: &ClientConfig) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", config::render(client_config)?);
    Ok(())
}
