use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select, Text, validator::Validation};
use weather_core::{
    Config, ProviderId,
    format::{format_forecasts, format_weather},
    input::parse_coordinates,
    provider::{default_provider_from_config, provider_from_config},
};

use crate::bot;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-bot", version, about = "Telegram weather bot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the bot and serve chats until interrupted.
    Run {
        /// Read configuration from this file instead of the default location.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Interactively store the bot token, provider key and default coordinates.
    Configure,

    /// Print the weather at the configured coordinates.
    Show {
        /// Print today's forecast instead of the current observation.
        #[arg(long)]
        forecast: bool,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run { config } => {
                let config = load_config(config.as_deref(), env_lookup)?;
                let settings = config.settings()?;
                let provider = provider_from_config(settings.provider, &config)?;

                bot::run(settings, Arc::from(provider)).await
            }
            Command::Configure => configure(),
            Command::Show { forecast, config } => {
                let config = load_config(config.as_deref(), env_lookup)?;
                let coordinates = config.coordinates.context(
                    "No default coordinates configured.\n\
                     Hint: run `weather-bot configure` or set COORDINATES=\"<lat> <lon>\".",
                )?;
                let provider = default_provider_from_config(&config)?;

                let text = if forecast {
                    format_forecasts(&provider.forecast(coordinates).await?)
                } else {
                    format_weather(&provider.current(coordinates).await?)
                };
                println!("{coordinates}\n\n{text}");
                Ok(())
            }
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// File first (explicit path or the platform default), then environment overrides.
fn load_config<F>(path: Option<&Path>, lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env(lookup)?;
    Ok(config)
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let provider = Select::new("Weather provider:", ProviderId::all().to_vec()).prompt()?;

    let api_key = secret_prompt(
        &format!("API key for {provider}:"),
        config.provider_api_key(provider).is_some(),
    )?;
    if let Some(api_key) = api_key {
        config.upsert_provider_api_key(provider, api_key);
    }
    config.set_default_provider(provider);

    if let Some(token) = secret_prompt("Telegram bot token:", config.telegram_token.is_some())? {
        config.telegram_token = Some(token);
    }

    let current = config.coordinates.map(|c| c.to_string()).unwrap_or_default();
    let coordinates = Text::new("Default coordinates (lat lon):")
        .with_default(&current)
        .with_help_message("e.g. 55.833333 37.616667")
        .with_validator(|input: &str| {
            Ok(match parse_coordinates(input) {
                Ok(_) => Validation::Valid,
                Err(err) => Validation::Invalid(err.to_string().into()),
            })
        })
        .prompt()?;
    config.coordinates = Some(parse_coordinates(&coordinates)?);

    let path = config.save()?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

/// Masked prompt; an empty answer keeps the stored value when there is one.
fn secret_prompt(message: &str, has_current: bool) -> anyhow::Result<Option<String>> {
    let mut prompt = Password::new(message)
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked);
    if has_current {
        prompt = prompt.with_help_message("leave empty to keep the current value");
    }

    let answer = prompt.prompt()?;
    let answer = answer.trim();
    if answer.is_empty() {
        anyhow::ensure!(has_current, "A value is required");
        return Ok(None);
    }
    Ok(Some(answer.to_string()))
}
