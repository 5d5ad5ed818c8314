use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{ConfigError, Result as AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct VkConfig {
    pub token: String,
    pub group_id: i64,
    pub api_version: String,
    pub poll_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub min_players: usize,
    pub max_players: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ContentSourceType {
    File,
    Http,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    pub source_type: ContentSourceType,
    pub file_path: Option<String>,
    pub http_url: Option<String>,
    /// Zero disables periodic catalog reloads.
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Snapshot file for sessions and user records; absent means an
    /// in-memory store (state is lost on restart).
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppSettings {
    pub vk: VkConfig,
    pub game: GameConfig,
    pub content: ContentConfig,
    pub store: StoreConfig,
}

pub fn load_settings() -> AppResult<AppSettings> {
    let settings = Config::builder()
        .add_source(
            Environment::with_prefix("POLE")
                .separator("__")
                .try_parsing(true),
        )
        .add_source(File::with_name("config").required(false))
        .set_default("vk.api_version", "5.131")
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .set_default("vk.poll_wait_secs", 25)
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .set_default("game.min_players", 3)
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .set_default("game.max_players", 5)
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .set_default("content.source_type", "file")
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .set_default("content.file_path", "questions.json")
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .set_default("content.refresh_interval_secs", 3600)
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .set_default("store.path", "sessions.json")
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let settings: AppSettings = settings
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &AppSettings) -> Result<(), ConfigError> {
    let game = &settings.game;
    if game.min_players < 2 {
        return Err(ConfigError::InvalidValue(format!(
            "game.min_players must be at least 2, got {}",
            game.min_players
        )));
    }
    if game.min_players > game.max_players {
        return Err(ConfigError::InvalidValue(format!(
            "game.min_players ({}) exceeds game.max_players ({})",
            game.min_players, game.max_players
        )));
    }
    if settings.vk.poll_wait_secs == 0 || settings.vk.poll_wait_secs > 90 {
        return Err(ConfigError::InvalidValue(format!(
            "vk.poll_wait_secs must be within 1..=90, got {}",
            settings.vk.poll_wait_secs
        )));
    }
    Ok(())
}
