use std::fmt::Write;

use crate::model::{Forecast, WeatherPoint};

pub const BAD_WEATHER_HEADLINE: &str = "Ожидается плохая погода";
pub const FORECAST_UNAVAILABLE: &str = "Не удалось получить прогноз погоды";
pub const WEATHER_UNAVAILABLE: &str = "Не удалось получить текущую погоду";

pub fn format_weather(weather: &WeatherPoint) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", weather.condition.label());
    let _ = writeln!(text, "Температура: {}℃", weather.temperature);
    let _ = writeln!(
        text,
        "Ветер: {} м/с {} {}",
        weather.wind_speed,
        weather.wind_direction.label(),
        weather.wind_direction.arrow()
    );
    let _ = writeln!(text, "Давление: {} мм рт.ст.", weather.pressure);
    let _ = writeln!(text, "Влажность: {}%", weather.humidity);
    text
}

pub fn format_forecast(forecast: &Forecast) -> String {
    let mut text = String::new();
    if let Some(part) = forecast.part {
        let _ = writeln!(text, "{}", part.label());
    }
    let _ = writeln!(text, "{}", forecast.condition.label());
    let _ = writeln!(
        text,
        "Температура: от {} до {}℃",
        forecast.min_temperature, forecast.max_temperature
    );
    let _ = writeln!(
        text,
        "Ветер: {} м/с {} {}",
        forecast.wind_speed,
        forecast.wind_direction.label(),
        forecast.wind_direction.arrow()
    );
    let _ = writeln!(text, "Давление: {} мм рт.ст.", forecast.pressure);
    let _ = writeln!(text, "Влажность: {}%", forecast.humidity);
    text
}

/// All day-parts, separated by blank lines.
pub fn format_forecasts(forecasts: &[Forecast]) -> String {
    forecasts
        .iter()
        .map(format_forecast)
        .collect::<Vec<_>>()
        .join("\n")
}
