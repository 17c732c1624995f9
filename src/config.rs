//! Configuration management

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub bot_token: String,

    /// Admin user IDs allowed to mutate the registry
    pub admin_ids: Vec<i64>,

    /// Path of the JSON links database
    pub links_file: PathBuf,

    /// Port for the keep-alive HTTP server
    pub health_port: u16,

    /// Consecutive connection failures tolerated before giving up
    pub max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    /// A missing bot token is a boot-time error; everything else defaults.
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("TELOXIDE_TOKEN")
            .or_else(|_| std::env::var("BOT_TOKEN"))
            .context("TELOXIDE_TOKEN (or BOT_TOKEN) environment variable is required")?;

        let admin_ids = parse_admin_ids(&std::env::var("ADMIN_IDS").unwrap_or_default());
        if admin_ids.is_empty() {
            tracing::warn!("No ADMIN_IDS configured. Bot will not respond to admin commands.");
        }

        let links_file = std::env::var("LINKS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("links.json"));

        let health_port = std::env::var("HEALTH_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8000);

        let max_retries = std::env::var("MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            bot_token,
            admin_ids,
            links_file,
            health_port,
            max_retries,
        })
    }

    /// Whether a sender may use privileged commands. An empty allow-list
    /// means nobody is an admin.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn parse_admin_ids(csv: &str) -> Vec<i64> {
    csv.split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids_csv() {
        assert_eq!(parse_admin_ids("12345, 67890"), vec![12345i64, 67890]);
        assert_eq!(parse_admin_ids("12345, junk, ,67890"), vec![12345i64, 67890]);
        assert!(parse_admin_ids("").is_empty());
    }

    #[test]
    fn test_empty_admin_list_denies_everyone() {
        let config = Config {
            bot_token: "t".into(),
            admin_ids: vec![],
            links_file: "links.json".into(),
            health_port: 8000,
            max_retries: 5,
        };
        assert!(!config.is_admin(0));
        assert!(!config.is_admin(12345));
    }

    #[test]
    fn test_is_admin_membership() {
        let config = Config {
            bot_token: "t".into(),
            admin_ids: vec![12345, 67890],
            links_file: "links.json".into(),
            health_port: 8000,
            max_retries: 5,
        };
        assert!(config.is_admin(12345));
        assert!(!config.is_admin(99999));
    }
}
