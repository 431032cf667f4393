mod config;
pub mod database;
pub mod migrations;
mod store;

pub use config::{Config, NotificationsConfig, TimerConfig};
pub use database::Database;
pub use store::{MemoryStore, SessionFilter, SessionRecord, SessionStore, SortOrder};

use std::path::PathBuf;

/// Returns `~/.config/pomofocus[-dev]/` based on POMOFOCUS_ENV.
///
/// Set POMOFOCUS_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("POMOFOCUS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pomofocus-dev")
    } else {
        base_dir.join("pomofocus")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
