//! Agent and tournament configuration loaded from TOML
//!
//! Player entries mirror the flat layout operators already write by hand:
//! a `type` tag plus optional per-agent parameters. Defaults are collected
//! here so the rest of the crate never hardcodes them.

use crate::core::error::{ArenaError, Result};
use crate::core::types::ModelId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the hosted-router bearer credential
pub const ROUTER_KEY_ENV: &str = "OPEN_ROUTER_KEY";
/// Environment variable overriding the local inference host
pub const LOCAL_HOST_ENV: &str = "OLLAMA_HOST";
pub const DEFAULT_LOCAL_HOST: &str = "http://127.0.0.1:11434";
pub const DEFAULT_ROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Turn after which an agent forfeits instead of asking its model
pub const DEFAULT_MAX_TURNS: u32 = 25;

/// Which model backend an agent talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Local,
    Router,
}

impl BackendKind {
    /// Event-history lines included in each prompt when not configured.
    ///
    /// Local models run with small context windows; hosted ones can afford more.
    pub fn default_history_len(&self) -> usize {
        match self {
            BackendKind::Local => 5,
            BackendKind::Router => 20,
        }
    }
}

/// Per-agent parameters for a model-driven player
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub username: String,
    pub model: ModelId,
    pub backend: BackendKind,
    /// Echo reasoning, scratchpad and chosen action to the console
    pub verbosity: bool,
    pub history_len: Option<usize>,
    pub max_turns: u32,
    /// No timeout when `None`; a hung call then stalls only its own battle
    pub request_timeout_secs: Option<u64>,
}

impl AgentConfig {
    pub fn new(username: impl Into<String>, model: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            username: username.into(),
            model: ModelId::new(model),
            backend,
            verbosity: false,
            history_len: None,
            max_turns: DEFAULT_MAX_TURNS,
            request_timeout_secs: None,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history_len
            .unwrap_or_else(|| self.backend.default_history_len())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Kind of player a tournament entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerKind {
    Local,
    Router,
    Random,
    #[serde(alias = "max")]
    MaxPower,
}

/// One `[[players]]` entry of a tournament file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub username: String,
    #[serde(rename = "type")]
    pub kind: PlayerKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub verbosity: bool,
    #[serde(default)]
    pub history_len: Option<usize>,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

impl PlayerConfig {
    pub fn baseline(username: impl Into<String>, kind: PlayerKind) -> Self {
        Self {
            username: username.into(),
            kind,
            model: None,
            verbosity: false,
            history_len: None,
            max_turns: DEFAULT_MAX_TURNS,
            request_timeout_secs: None,
        }
    }

    pub fn model_driven(
        username: impl Into<String>,
        kind: PlayerKind,
        model: impl Into<String>,
    ) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::baseline(username, kind)
        }
    }

    /// Agent parameters for model-driven entries, `None` for baseline bots
    pub fn agent_config(&self) -> Result<Option<AgentConfig>> {
        let backend = match self.kind {
            PlayerKind::Local => BackendKind::Local,
            PlayerKind::Router => BackendKind::Router,
            PlayerKind::Random | PlayerKind::MaxPower => return Ok(None),
        };
        let model = self.model.as_deref().ok_or_else(|| {
            ArenaError::Config(format!("player '{}' needs a model", self.username))
        })?;

        Ok(Some(AgentConfig {
            username: self.username.clone(),
            model: ModelId::new(model),
            backend,
            verbosity: self.verbosity,
            history_len: self.history_len,
            max_turns: self.max_turns,
            request_timeout_secs: self.request_timeout_secs,
        }))
    }
}

/// Complete round-robin tournament description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentConfig {
    #[serde(default = "default_battle_format")]
    pub battle_format: String,
    #[serde(default = "default_team_size")]
    pub team_size: usize,
    #[serde(default = "default_n_challenges")]
    pub n_challenges: u32,
    pub system_prompt_path: PathBuf,
    pub builds_path: PathBuf,
    /// Builds tagged with this format label are never drawn
    #[serde(default)]
    pub exclude_format: Option<String>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    pub players: Vec<PlayerConfig>,
}

fn default_battle_format() -> String {
    "gen3ubers".to_string()
}

fn default_team_size() -> usize {
    4
}

fn default_n_challenges() -> u32 {
    3
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("battle_logs")
}

impl TournamentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ArenaError::Config(format!("Failed to read tournament file {:?}: {}", path, e))
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: TournamentConfig = toml::from_str(contents)?;
        if config.players.len() < 2 {
            return Err(ArenaError::Config(
                "a tournament needs at least two players".into(),
            ));
        }
        for player in &config.players {
            player.agent_config()?;
        }
        Ok(config)
    }
}

/// Fixed system instruction prepended to every prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub system_prompt: String,
}

impl SystemPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            system_prompt: text.into(),
        }
    }

    /// Load from a TOML document with a `system_prompt` key
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ArenaError::Config(format!("Failed to read system prompt {:?}: {}", path, e))
        })?;
        let prompt: SystemPrompt = toml::from_str(&contents)?;
        Ok(prompt)
    }

    pub fn text(&self) -> &str {
        &self.system_prompt
    }
}

/// Bearer credential for the hosted router, read from the process environment
pub fn router_api_key() -> Result<String> {
    std::env::var(ROUTER_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ArenaError::MissingCredential(format!("{} not set", ROUTER_KEY_ENV)))
}

/// Base URL of the local inference server
pub fn local_host() -> String {
    std::env::var(LOCAL_HOST_ENV)
        .ok()
        .filter(|host| !host.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOCAL_HOST.to_string())
}
