use crate::{
    Config,
    model::{Coordinates, Forecast, WeatherPoint},
    provider::yandex::YandexProvider,
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug};

pub mod yandex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Yandex,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Yandex => "yandex",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Yandex]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "yandex" => Ok(ProviderId::Yandex),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: yandex."
            )),
        }
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Latest observation at the given point.
    async fn current(&self, coordinates: Coordinates) -> anyhow::Result<WeatherPoint>;

    /// Today's outlook, one entry per day-part in chronological order.
    async fn forecast(&self, coordinates: Coordinates) -> anyhow::Result<Vec<Forecast>>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.provider_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather-bot configure` or set YANDEX_KEY."
        )
    })?;

    let boxed: Box<dyn WeatherProvider> = match id {
        ProviderId::Yandex => Box::new(YandexProvider::new(api_key.to_owned())),
    };

    Ok(boxed)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}
