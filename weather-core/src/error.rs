use thiserror::Error;

/// Free-text input that does not match the expected grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("invalid time of day '{0}', expected H:MM or HH:MM")]
    TimeOfDay(String),

    #[error("invalid coordinates '{0}', expected '<lat> <lon>'")]
    Coordinates(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("interval must be longer than zero")]
    ZeroInterval,

    #[error("interval of {0:?} is too long to schedule")]
    IntervalTooLong(std::time::Duration),
}
