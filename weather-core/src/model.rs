use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic point used for every weather query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.lat, self.lon)
    }
}

/// Weather conditions, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherCondition {
    Thunderstorm,
    Drizzle,
    Rain,
    Snow,
    Clear,
    Clouds,
}

impl WeatherCondition {
    /// Clear sky and clouds are the only conditions that do not raise an alarm.
    pub fn is_benign(&self) -> bool {
        matches!(self, WeatherCondition::Clear | WeatherCondition::Clouds)
    }

    pub fn label(&self) -> &'static str {
        match self {
            WeatherCondition::Clear => "☀ Ясно",
            WeatherCondition::Clouds => "🌥 Облачно",
            WeatherCondition::Drizzle => "🌦 Мелкий дождь",
            WeatherCondition::Rain => "🌧 Дождь",
            WeatherCondition::Snow => "🌨 Снег",
            WeatherCondition::Thunderstorm => "⛈ Гроза",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindDirection {
    NW,
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    Calm,
}

impl WindDirection {
    pub fn label(&self) -> &'static str {
        match self {
            WindDirection::NW => "СЗ",
            WindDirection::N => "С",
            WindDirection::NE => "СВ",
            WindDirection::E => "В",
            WindDirection::SE => "ЮВ",
            WindDirection::S => "Ю",
            WindDirection::SW => "ЮЗ",
            WindDirection::W => "З",
            WindDirection::Calm => "штиль",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            WindDirection::NW => "↖️",
            WindDirection::N => "⬆️",
            WindDirection::NE => "↗️",
            WindDirection::E => "➡️",
            WindDirection::SE => "↘️",
            WindDirection::S => "⬇️",
            WindDirection::SW => "↙️",
            WindDirection::W => "⬅️",
            WindDirection::Calm => "⏺",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DayPart {
    Morning,
    Day,
    Evening,
    Night,
}

impl DayPart {
    pub fn label(&self) -> &'static str {
        match self {
            DayPart::Morning => "Утро",
            DayPart::Day => "День",
            DayPart::Evening => "Вечер",
            DayPart::Night => "Ночь",
        }
    }
}

/// Point-in-time observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPoint {
    pub time: DateTime<Utc>,
    /// Degrees Celsius.
    pub temperature: i32,
    /// Millimetres of mercury.
    pub pressure: i32,
    pub condition: WeatherCondition,
    /// Metres per second.
    pub wind_speed: f64,
    pub wind_direction: WindDirection,
    /// Relative humidity, percent.
    pub humidity: i32,
}

/// Outlook for one part of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub part: Option<DayPart>,
    pub min_temperature: i32,
    pub max_temperature: i32,
    pub pressure: i32,
    pub condition: WeatherCondition,
    pub wind_speed: f64,
    pub wind_direction: WindDirection,
    pub humidity: i32,
}
