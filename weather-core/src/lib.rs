//! Core library for the `weather-bot` chat bot.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over weather providers and message delivery
//! - A job registry with daily and interval triggers, driven by a timer thread
//! - The coordinator that owns the alarm and the forecast schedule
//! - Per-chat conversation state for free-text input
//!
//! It is used by `weather-bot`, but does not depend on any messaging platform.

pub mod alarm;
pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod error;
pub mod format;
pub mod input;
pub mod model;
pub mod notify;
pub mod provider;
pub mod schedule;
pub mod timer;

pub use config::{Config, ProviderConfig, Settings};
pub use conversation::{ConversationState, Conversations, InputOutcome};
pub use coordinator::{Coordinator, JobAction};
pub use error::{InputError, ScheduleError};
pub use input::TimeOfDay;
pub use model::{Coordinates, DayPart, Forecast, WeatherCondition, WeatherPoint, WindDirection};
pub use notify::{Destination, Notifier};
pub use provider::{ProviderId, WeatherProvider};
pub use schedule::{DailyRegistration, JobHandle, JobRegistry, Trigger};
pub use timer::{Fired, SharedRegistry, Timer};
