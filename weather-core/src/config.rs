use anyhow::{Context, Result, anyhow, bail, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{input::parse_coordinates, model::Coordinates, provider::ProviderId};

pub const DEFAULT_ALARM_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_TICK_MILLIS: u64 = 1000;

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "yandex".
    pub default_provider: Option<String>,

    /// Bot token issued by @BotFather.
    pub telegram_token: Option<String>,

    /// Location used until a user changes it from the chat.
    pub coordinates: Option<Coordinates>,

    /// How often the bad-weather alarm polls the forecast.
    pub alarm_interval_secs: Option<u64>,

    /// Scheduler clock resolution.
    pub tick_millis: Option<u64>,

    /// Example TOML:
    /// [providers.yandex]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Everything the bot needs to start, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub telegram_token: String,
    pub provider: ProviderId,
    pub coordinates: Coordinates,
    pub alarm_interval: Duration,
    pub tick: Duration,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `weather-bot configure` or set YANDEX_KEY."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from the default location, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default location, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-bot", "weather-bot")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Convenience helper: set/replace a provider API key and optionally set default provider.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some_and(|key| !key.trim().is_empty())
    }

    /// Overlay values from the environment on top of the file.
    ///
    /// Recognized variables: `TELEGRAM_TOKEN`, `YANDEX_KEY`, `COORDINATES`
    /// (`"<lat> <lon>"`) and `ALARM_INTERVAL_SECS`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_TOKEN") {
            self.telegram_token = Some(token);
        }

        if let Some(key) = lookup("YANDEX_KEY") {
            self.upsert_provider_api_key(ProviderId::Yandex, key);
        }

        if let Some(raw) = lookup("COORDINATES") {
            let coordinates = parse_coordinates(&raw).context("Invalid COORDINATES variable")?;
            self.coordinates = Some(coordinates);
        }

        if let Some(raw) = lookup("ALARM_INTERVAL_SECS") {
            let secs = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid ALARM_INTERVAL_SECS variable '{raw}'"))?;
            self.alarm_interval_secs = Some(secs);
        }

        Ok(())
    }

    /// Check that everything needed to run the bot is present.
    pub fn settings(&self) -> Result<Settings> {
        let telegram_token = self
            .telegram_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No Telegram token configured.\n\
                     Hint: run `weather-bot configure` or set TELEGRAM_TOKEN."
                )
            })?
            .to_string();

        let provider = self.default_provider_id()?;
        if !self.is_provider_configured(provider) {
            bail!(
                "No API key configured for provider '{provider}'.\n\
                 Hint: run `weather-bot configure` or set YANDEX_KEY."
            );
        }

        let coordinates = self.coordinates.ok_or_else(|| {
            anyhow!(
                "No default coordinates configured.\n\
                 Hint: run `weather-bot configure` or set COORDINATES=\"<lat> <lon>\"."
            )
        })?;

        let alarm_interval =
            Duration::from_secs(self.alarm_interval_secs.unwrap_or(DEFAULT_ALARM_INTERVAL_SECS));
        ensure!(!alarm_interval.is_zero(), "alarm_interval_secs must be greater than zero");

        let tick = Duration::from_millis(self.tick_millis.unwrap_or(DEFAULT_TICK_MILLIS));
        ensure!(!tick.is_zero(), "tick_millis must be greater than zero");

        Ok(Settings { telegram_token, provider, coordinates, alarm_interval, tick })
    }
}
