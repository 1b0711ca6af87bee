//! Grammars for the free-text answers a user types into the chat.
//!
//! - time of day: `H:MM` or `HH:MM`, hour 0–23, minute 0–59
//! - coordinates: two whitespace-separated numbers, latitude then longitude

use std::{fmt, str::FromStr};

use chrono::NaiveTime;

use crate::{error::InputError, model::Coordinates};

/// Wall-clock time with minute precision, used as the key of daily schedule entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, InputError> {
        if hour > 23 || minute > 59 {
            return Err(InputError::TimeOfDay(format!("{hour}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        // Both fields are range-checked on construction.
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_time_of_day(s)
    }
}

impl FromStr for Coordinates {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_coordinates(s)
    }
}

pub fn parse_time_of_day(input: &str) -> Result<TimeOfDay, InputError> {
    let invalid = || InputError::TimeOfDay(input.to_string());
    let trimmed = input.trim();

    let (hour, minute) = trimmed.split_once(':').ok_or_else(invalid)?;

    if !(1..=2).contains(&hour.len()) || minute.len() != 2 {
        return Err(invalid());
    }
    if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let hour: u8 = hour.parse().map_err(|_| invalid())?;
    let minute: u8 = minute.parse().map_err(|_| invalid())?;

    TimeOfDay::new(hour, minute).map_err(|_| invalid())
}

pub fn parse_coordinates(input: &str) -> Result<Coordinates, InputError> {
    let invalid = || InputError::Coordinates(input.to_string());

    let mut tokens = input.split_whitespace();
    let (Some(lat), Some(lon), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(invalid());
    };

    let lat: f64 = lat.parse().map_err(|_| invalid())?;
    let lon: f64 = lon.parse().map_err(|_| invalid())?;

    if !lat.is_finite() || !lon.is_finite() {
        return Err(invalid());
    }

    Ok(Coordinates::new(lat, lon))
}
