use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::model::{Coordinates, DayPart, Forecast, WeatherCondition, WeatherPoint, WindDirection};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "https://api.weather.yandex.ru";

#[derive(Debug, Clone)]
pub struct YandexProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl YandexProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the provider at another host, e.g. a mock server.
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    async fn fetch(&self, coordinates: Coordinates) -> Result<YaResponse> {
        let url = format!("{}/v2/forecast", self.base_url);

        let res = self
            .http
            .get(&url)
            .header("X-Yandex-API-Key", self.api_key.as_str())
            .query(&[
                ("lat", coordinates.lat.to_string()),
                ("lon", coordinates.lon.to_string()),
                ("lang", "ru_RU".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to Yandex Weather")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read Yandex Weather response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Yandex Weather request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body).context("Failed to parse Yandex Weather JSON")
    }
}

#[derive(Debug, Deserialize)]
struct YaFact {
    temp: f64,
    pressure_mm: f64,
    condition: String,
    wind_speed: f64,
    wind_dir: String,
    humidity: f64,
    obs_time: i64,
}

#[derive(Debug, Deserialize)]
struct YaPart {
    temp_min: f64,
    temp_max: f64,
    pressure_mm: f64,
    condition: String,
    wind_speed: f64,
    wind_dir: String,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct YaParts {
    morning: Option<YaPart>,
    day: Option<YaPart>,
    evening: Option<YaPart>,
    night: Option<YaPart>,
}

#[derive(Debug, Deserialize)]
struct YaForecastDay {
    parts: YaParts,
}

#[derive(Debug, Deserialize)]
struct YaResponse {
    fact: YaFact,
    #[serde(default)]
    forecasts: Vec<YaForecastDay>,
}

#[async_trait]
impl WeatherProvider for YandexProvider {
    async fn current(&self, coordinates: Coordinates) -> Result<WeatherPoint> {
        let fact = self.fetch(coordinates).await?.fact;

        Ok(WeatherPoint {
            time: unix_to_utc(fact.obs_time).unwrap_or_else(Utc::now),
            temperature: fact.temp.round() as i32,
            pressure: fact.pressure_mm.round() as i32,
            condition: convert_condition(&fact.condition)?,
            wind_speed: fact.wind_speed,
            wind_direction: convert_wind_direction(&fact.wind_dir)?,
            humidity: fact.humidity.round() as i32,
        })
    }

    async fn forecast(&self, coordinates: Coordinates) -> Result<Vec<Forecast>> {
        let response = self.fetch(coordinates).await?;

        let day = response
            .forecasts
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Yandex Weather response contained no forecast data"))?;

        let YaParts { morning, day: daytime, evening, night } = day.parts;

        [
            (DayPart::Morning, morning),
            (DayPart::Day, daytime),
            (DayPart::Evening, evening),
            (DayPart::Night, night),
        ]
        .into_iter()
        .filter_map(|(part, raw)| raw.map(|raw| (part, raw)))
        .map(|(part, raw)| -> Result<Forecast> {
            Ok(Forecast {
                part: Some(part),
                min_temperature: raw.temp_min.round() as i32,
                max_temperature: raw.temp_max.round() as i32,
                pressure: raw.pressure_mm.round() as i32,
                condition: convert_condition(&raw.condition)?,
                wind_speed: raw.wind_speed,
                wind_direction: convert_wind_direction(&raw.wind_dir)?,
                humidity: raw.humidity.round() as i32,
            })
        })
        .collect()
    }
}

fn convert_condition(code: &str) -> Result<WeatherCondition> {
    let condition = match code {
        "clear" => WeatherCondition::Clear,
        "partly-cloudy" | "cloudy" | "overcast" => WeatherCondition::Clouds,
        "partly-cloudy-and-light-rain"
        | "cloudy-and-light-rain"
        | "overcast-and-light-rain"
        | "light-rain"
        | "drizzle" => WeatherCondition::Drizzle,
        "partly-cloudy-and-rain"
        | "overcast-and-rain"
        | "cloudy-and-rain"
        | "rain"
        | "moderate-rain"
        | "heavy-rain"
        | "continuous-heavy-rain"
        | "showers" => WeatherCondition::Rain,
        "overcast-thunderstorms-with-rain"
        | "thunderstorm"
        | "thunderstorm-with-rain"
        | "thunderstorm-with-hail" => WeatherCondition::Thunderstorm,
        "overcast-and-wet-snow"
        | "partly-cloudy-and-light-snow"
        | "partly-cloudy-and-snow"
        | "overcast-and-snow"
        | "cloudy-and-light-snow"
        | "overcast-and-light-snow"
        | "cloudy-and-snow"
        | "wet-snow"
        | "light-snow"
        | "snow"
        | "snow-showers"
        | "hail" => WeatherCondition::Snow,
        other => return Err(anyhow!("Unknown Yandex Weather condition '{other}'")),
    };
    Ok(condition)
}

fn convert_wind_direction(code: &str) -> Result<WindDirection> {
    let direction = match code {
        "nw" => WindDirection::NW,
        "n" => WindDirection::N,
        "ne" => WindDirection::NE,
        "e" => WindDirection::E,
        "se" => WindDirection::SE,
        "s" => WindDirection::S,
        "sw" => WindDirection::SW,
        "w" => WindDirection::W,
        "c" => WindDirection::Calm,
        other => return Err(anyhow!("Unknown Yandex Weather wind direction '{other}'")),
    };
    Ok(direction)
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn part(condition: &str, temp_min: i32, temp_max: i32) -> serde_json::Value {
        serde_json::json!({
            "temp_min": temp_min,
            "temp_max": temp_max,
            "temp_avg": (temp_min + temp_max) / 2,
            "pressure_mm": 745,
            "condition": condition,
            "wind_speed": 3.1,
            "wind_dir": "sw",
            "humidity": 78
        })
    }

    fn response_body(evening_condition: &str) -> serde_json::Value {
        serde_json::json!({
            "now": 1_700_000_000,
            "fact": {
                "temp": 7,
                "feels_like": 3,
                "pressure_mm": 748,
                "condition": "overcast",
                "wind_speed": 4.5,
                "wind_dir": "c",
                "humidity": 83,
                "obs_time": 1_700_000_000
            },
            "forecasts": [{
                "date": "2023-11-14",
                "parts": {
                    "night": part("clear", 1, 3),
                    "morning": part("cloudy", 2, 5),
                    "day": part("partly-cloudy", 5, 9),
                    "evening": part(evening_condition, 4, 6),
                    "day_short": part("cloudy", 4, 9),
                    "night_short": part("clear", 1, 1)
                }
            }]
        })
    }

    async fn mock_ok(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v2/forecast"))
            .and(header("X-Yandex-API-Key", "test_key"))
            .and(query_param("lat", "55.75"))
            .and(query_param("lon", "37.62"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn moscow() -> Coordinates {
        Coordinates::new(55.75, 37.62)
    }

    #[tokio::test]
    async fn current_maps_fact() {
        let server = MockServer::start().await;
        mock_ok(&server, response_body("rain")).await;

        let provider = YandexProvider::with_base_url("test_key".into(), server.uri());
        let point = provider.current(moscow()).await.unwrap();

        assert_eq!(point.temperature, 7);
        assert_eq!(point.pressure, 748);
        assert_eq!(point.condition, WeatherCondition::Clouds);
        assert_eq!(point.wind_direction, WindDirection::Calm);
        assert_eq!(point.humidity, 83);
        assert_eq!(point.time.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn forecast_lists_day_parts_chronologically() {
        let server = MockServer::start().await;
        mock_ok(&server, response_body("overcast-and-rain")).await;

        let provider = YandexProvider::with_base_url("test_key".into(), server.uri());
        let forecasts = provider.forecast(moscow()).await.unwrap();

        let parts: Vec<_> = forecasts.iter().map(|f| f.part).collect();
        assert_eq!(
            parts,
            [Some(DayPart::Morning), Some(DayPart::Day), Some(DayPart::Evening), Some(DayPart::Night)]
        );
        assert_eq!(forecasts[2].condition, WeatherCondition::Rain);
        assert_eq!(forecasts[1].min_temperature, 5);
        assert_eq!(forecasts[1].max_temperature, 9);
        assert_eq!(forecasts[0].wind_direction, WindDirection::SW);
    }

    #[tokio::test]
    async fn unknown_condition_is_an_error() {
        let server = MockServer::start().await;
        mock_ok(&server, response_body("volcanic-ash")).await;

        let provider = YandexProvider::with_base_url("test_key".into(), server.uri());
        let err = provider.forecast(moscow()).await.unwrap_err();

        assert!(err.to_string().contains("volcanic-ash"), "{err}");
    }

    #[tokio::test]
    async fn missing_forecast_days_is_an_error() {
        let server = MockServer::start().await;
        let mut body = response_body("rain");
        body["forecasts"] = serde_json::json!([]);
        mock_ok(&server, body).await;

        let provider = YandexProvider::with_base_url("test_key".into(), server.uri());
        let err = provider.forecast(moscow()).await.unwrap_err();

        assert!(err.to_string().contains("no forecast data"), "{err}");
    }

    #[tokio::test]
    async fn http_error_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/forecast"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let provider = YandexProvider::with_base_url("bad_key".into(), server.uri());
        let err = provider.current(moscow()).await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("403"), "{msg}");
        assert!(msg.contains("Forbidden"), "{msg}");
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"fact\": 1}"))
            .mount(&server)
            .await;

        let provider = YandexProvider::with_base_url("test_key".into(), server.uri());
        let err = provider.current(moscow()).await.unwrap_err();

        assert!(err.to_string().contains("Failed to parse"), "{err}");
    }

    #[test]
    fn legacy_compound_conditions_are_mapped() {
        assert_eq!(
            convert_condition("overcast-thunderstorms-with-rain").unwrap(),
            WeatherCondition::Thunderstorm
        );
        assert_eq!(convert_condition("cloudy-and-light-rain").unwrap(), WeatherCondition::Drizzle);
        assert_eq!(convert_condition("overcast-and-wet-snow").unwrap(), WeatherCondition::Snow);
    }

    #[test]
    fn unknown_wind_direction_is_an_error() {
        assert!(convert_wind_direction("up").is_err());
        assert_eq!(convert_wind_direction("ne").unwrap(), WindDirection::NE);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "я".repeat(300);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
