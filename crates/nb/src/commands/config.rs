//! Config command implementation.
//!
//! View and manage configuration settings.
//! The config file is located at ~/.config/notibox/config.toml.

use std::env;
use std::fs;
use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};
use notibox_core::sync::SyncSettings;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandError, Result};

/// Schema version written to new config files.
const CONFIG_VERSION: u32 = 1;

/// Tokens up to this many characters are fully hidden.
const TOKEN_MASK_MIN_LENGTH: usize = 8;

/// Characters kept visible at each end of a masked token.
const TOKEN_MASK_VISIBLE_CHARS: usize = 4;

/// User the local store files notifications under when none is configured.
pub const DEFAULT_USER_ID: &str = "me";

const CONFIG_ENV: &str = "NOTIBOX_CONFIG";
const APP_NAME: &str = "notibox";

/// Contents of `config.toml`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Schema version; files written before versioning load as the current one.
    #[serde(default = "default_version")]
    pub version: u32,

    /// GitHub token (optional, can use GITHUB_TOKEN instead).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Owner of the notifications in the local store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            token: None,
            user_id: None,
            database: DatabaseConfig::default(),
            github: GithubConfig::default(),
            sync: SyncConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// GitHub API configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API root for GitHub Enterprise Server, e.g. https://ghe.example.com/api/v3.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Sync configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Days of history fetched on the first sync; 0 fetches everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_sync_days: Option<u32>,

    /// Most threads kept by the first sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_only: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

/// Output configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Enable colors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
}

impl Config {
    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(DEFAULT_USER_ID)
    }

    /// Path of the SQLite database: the configured one, else the platform
    /// data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(PathBuf::from(path));
        }
        ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.data_dir().join("notibox.db"))
            .ok_or_else(|| CommandError::Config("Could not determine data directory".to_string()))
    }

    pub fn sync_settings(&self) -> SyncSettings {
        let defaults = SyncSettings::default();
        SyncSettings {
            initial_sync_days: match self.sync.initial_sync_days {
                Some(0) => None,
                Some(days) => Some(days),
                None => defaults.initial_sync_days,
            },
            max_count: self.sync.max_count.or(defaults.max_count),
            unread_only: self.sync.unread_only.unwrap_or(defaults.unread_only),
            per_page: self.sync.per_page.unwrap_or(defaults.per_page),
        }
    }
}

/// Gets the config file path.
///
/// Resolution order: `$NOTIBOX_CONFIG`, `$XDG_CONFIG_HOME/notibox/config.toml`,
/// then `~/.config/notibox/config.toml`.
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg_config).join(APP_NAME).join("config.toml"));
    }

    BaseDirs::new()
        .map(|dirs| {
            dirs.home_dir()
                .join(".config")
                .join(APP_NAME)
                .join("config.toml")
        })
        .ok_or_else(|| CommandError::Config("Could not determine config directory".to_string()))
}

/// Loads the configuration from disk. A missing file yields the defaults.
pub fn load_config() -> Result<Config> {
    let path = get_config_path()?;

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| CommandError::Config(format!("Failed to read config: {}", e)))?;

    let mut config: Config = toml::from_str(&content)
        .map_err(|e| CommandError::Config(format!("Failed to parse config: {}", e)))?;

    config.version = CONFIG_VERSION;
    Ok(config)
}

fn save_config(config: &Config) -> Result<()> {
    let path = get_config_path()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            CommandError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| CommandError::Config(format!("Failed to serialize config: {}", e)))?;

    fs::write(&path, content)
        .map_err(|e| CommandError::Config(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Executes the config show command.
pub fn execute_show(ctx: &CommandContext) -> Result<()> {
    let mut config = load_config()?;
    let path = get_config_path()?;

    if ctx.json_output {
        config.token = config.token.as_deref().map(mask_token);
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !ctx.quiet {
        use owo_colors::OwoColorize;

        let header = "Configuration";
        if ctx.use_colors {
            println!("{}\n", header.green().bold());
        } else {
            println!("{}\n", header);
        }

        println!("File: {}", path.display());
        println!("Exists: {}\n", path.exists());

        println!("Settings:");
        if let Some(ref token) = config.token {
            println!("  token: {}", mask_token(token));
        }
        println!("  user_id: {}", config.user_id());
        println!("  database.path: {}", config.database_path()?.display());
        if let Some(ref api_url) = config.github.api_url {
            println!("  github.api_url: {}", api_url);
        }

        let sync = config.sync_settings();
        println!("\n[sync]");
        match sync.initial_sync_days {
            Some(days) => println!("  initial_sync_days: {}", days),
            None => println!("  initial_sync_days: all"),
        }
        if let Some(max) = sync.max_count {
            println!("  max_count: {}", max);
        }
        println!("  unread_only: {}", sync.unread_only);
        println!("  per_page: {}", sync.per_page);

        if let Some(color) = config.output.color {
            println!("\n[output]");
            println!("  color: {}", color);
        }
    }

    Ok(())
}

/// Options for the config set command.
pub struct ConfigSetOptions {
    /// Configuration key.
    pub key: String,
    /// Configuration value.
    pub value: String,
}

const VALID_KEYS: &str = "token, user_id, database.path, github.api_url, sync.initial_sync_days, \
                          sync.max_count, sync.unread_only, sync.per_page, output.color";

/// Executes the config set command.
pub fn execute_set(ctx: &CommandContext, opts: &ConfigSetOptions) -> Result<()> {
    let mut config = load_config()?;
    let path = get_config_path()?;

    apply_setting(&mut config, &opts.key, &opts.value)?;
    save_config(&config)?;

    if ctx.json_output {
        let output = serde_json::json!({
            "status": "success",
            "key": opts.key,
            "path": path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !ctx.quiet {
        let shown = if opts.key == "token" {
            mask_token(&opts.value)
        } else {
            opts.value.clone()
        };
        println!("Set {} = {}", opts.key, shown);
    }

    Ok(())
}

fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key.split_once('.').unwrap_or(("", key)) {
        ("", "token") => config.token = Some(value.to_string()),
        ("", "user_id") => config.user_id = Some(value.to_string()),
        ("database", "path") => config.database.path = Some(value.to_string()),
        ("github", "api_url") => {
            config.github.api_url = Some(value.trim_end_matches('/').to_string())
        }
        ("sync", "initial_sync_days") => {
            config.sync.initial_sync_days = Some(parse_number(key, value)?)
        }
        ("sync", "max_count") => config.sync.max_count = Some(parse_number(key, value)?),
        ("sync", "unread_only") => config.sync.unread_only = Some(parse_bool(value)?),
        ("sync", "per_page") => {
            let per_page: u32 = parse_number(key, value)?;
            if !(1..=50).contains(&per_page) {
                return Err(CommandError::Config(
                    "sync.per_page must be between 1 and 50".to_string(),
                ));
            }
            config.sync.per_page = Some(per_page);
        }
        ("output", "color") => config.output.color = Some(parse_bool(value)?),
        _ => {
            return Err(CommandError::Config(format!(
                "Unknown config key '{}'. Valid keys: {}",
                key, VALID_KEYS
            )))
        }
    }
    Ok(())
}

/// Executes the config path command.
pub fn execute_path(ctx: &CommandContext) -> Result<()> {
    let path = get_config_path()?;

    if ctx.json_output {
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", path.display());
    }

    Ok(())
}

/// Hides all but the ends of a token. Short tokens are hidden entirely.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= TOKEN_MASK_MIN_LENGTH {
        return "****".to_string();
    }
    let head: String = chars[..TOKEN_MASK_VISIBLE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - TOKEN_MASK_VISIBLE_CHARS..].iter().collect();
    format!("{head}...{tail}")
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(CommandError::Config(format!(
            "Expected a boolean (true/false, yes/no, 1/0, on/off), got '{}'",
            s
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, s: &str) -> Result<T> {
    s.trim()
        .parse()
        .map_err(|_| CommandError::Config(format!("Invalid number '{}' for {}", s, key)))
}
