//! Configuration paths and the optional `config.toml`.
//!
//! All paths are under ~/.filmdesk/ (or `FILMDESK_HOME`). The config file only
//! carries non-secret settings; the storage key is read from
//! `FILMDESK_STORAGE_KEY`.

use anyhow::Context;
use filmdesk_agents::StorageConfig;
use filmdesk_logging::{filmdesk_home, logs_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::HelpfulError;

pub const STORAGE_KEY_ENV: &str = "FILMDESK_STORAGE_KEY";

/// Default database: ~/.filmdesk/filmdesk.sqlite3
pub fn default_db_path() -> PathBuf {
    filmdesk_home().join("filmdesk.sqlite3")
}

/// Config file: ~/.filmdesk/config.toml
pub fn config_path() -> PathBuf {
    filmdesk_home().join("config.toml")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub agents: AgentsSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentsSection {
    /// Idle sleep between empty polls, in seconds
    pub sleep_secs: Option<u64>,
    /// Add random score noise during discovery
    pub noise: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub url: Option<String>,
    pub bucket: Option<String>,
}

impl FileConfig {
    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).map_err(|e| {
            HelpfulError::new("Invalid config file")
                .with_context(format!("{}: {}", path.display(), e))
                .with_suggestion(
                    "TRY: Known sections are [agents] (sleep_secs, noise) and [storage] (url, bucket)",
                )
                .into()
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Object storage settings, with the key taken from `key`.
    ///
    /// `Ok(None)` when storage is not configured at all.
    pub fn storage_config(&self, key: Option<String>) -> anyhow::Result<Option<StorageConfig>> {
        let url = self.storage.url.clone();
        let bucket = self.storage.bucket.clone();
        StorageConfig::resolve(url, bucket, key).map_err(|e| {
            HelpfulError::new(e.to_string())
                .with_context(format!(
                    "[storage] in {} plus {}",
                    config_path().display(),
                    STORAGE_KEY_ENV
                ))
                .with_suggestion(
                    "TRY: Set url and bucket in config.toml and export FILMDESK_STORAGE_KEY, \
                     or remove all three",
                )
                .into()
        })
    }
}

/// Arguments for the config command
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Show resolved paths in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run the config command - shows current paths and settings
pub fn run(args: ConfigArgs, db_path: &Path) -> anyhow::Result<()> {
    let home = filmdesk_home();
    let config_file = config_path();
    let config = FileConfig::load(&config_file)?;
    let key_set = std::env::var(STORAGE_KEY_ENV).map(|k| !k.trim().is_empty()).unwrap_or(false);

    if args.json {
        let value = serde_json::json!({
            "home": home.to_string_lossy(),
            "database": {
                "path": db_path.to_string_lossy(),
                "exists": db_path.exists(),
            },
            "config_file": {
                "path": config_file.to_string_lossy(),
                "exists": config_file.exists(),
            },
            "logs": logs_dir().to_string_lossy(),
            "agents": config.agents,
            "storage": {
                "url": config.storage.url,
                "bucket": config.storage.bucket,
                "key_set": key_set,
            },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let exists = |p: &Path| if p.exists() { "" } else { " (not created yet)" };
    println!("FilmDesk Configuration");
    println!();
    println!("Home:      {}", home.display());
    println!("Database:  {}{}", db_path.display(), exists(db_path));
    println!("Config:    {}{}", config_file.display(), exists(&config_file));
    println!("Logs:      {}", logs_dir().display());
    println!();
    println!(
        "Poller:    sleep {}s, noise {}",
        config.agents.sleep_secs.unwrap_or(5),
        if config.agents.noise { "on" } else { "off" }
    );
    match (&config.storage.url, &config.storage.bucket) {
        (Some(url), Some(bucket)) => println!(
            "Storage:   {} bucket '{}' (key {})",
            url,
            bucket,
            if key_set { "set" } else { "missing" }
        ),
        _ => println!("Storage:   not configured"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = FileConfig::parse(
            r#"
            [agents]
            sleep_secs = 2
            noise = true

            [storage]
            url = "https://x.supabase.co"
            bucket = "scripts"
            "#,
        )
        .unwrap();
        assert_eq!(config.agents.sleep_secs, Some(2));
        assert!(config.agents.noise);
        assert_eq!(config.storage.bucket.as_deref(), Some("scripts"));

        let storage = config.storage_config(Some("secret".into())).unwrap().unwrap();
        assert_eq!(storage.url, "https://x.supabase.co");
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert!(config.storage_config(None).unwrap().is_none());
    }

    #[test]
    fn test_partial_storage_is_rejected() {
        let config = FileConfig::parse("[storage]\nurl = \"https://x.supabase.co\"\n").unwrap();
        assert!(config.storage_config(None).is_err());
    }

    #[test]
    fn test_key_is_not_a_config_field() {
        assert!(FileConfig::parse("[storage]\nkey = \"oops\"\n").is_err());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = FileConfig::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, FileConfig::default());
    }
}
