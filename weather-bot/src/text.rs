//! User-facing texts and menu labels.

use weather_core::{InputError, InputOutcome};

pub const GET_WEATHER: &str = "Погода";
pub const GET_FORECAST: &str = "Прогноз";
pub const SETTINGS: &str = "Настройки";
pub const TURN_ON_ALARM: &str = "Вкл. оповещение";
pub const TURN_OFF_ALARM: &str = "Выкл. оповещение";

pub const SCHEDULE: &str = "Расписание";
pub const CHANGE_COORDINATES: &str = "Изменить координаты";
pub const SCHEDULE_ADD: &str = "Добавить";
pub const SCHEDULE_DEL: &str = "Удалить";

pub const GREETING: &str = "Привет! Я пришлю текущую погоду, прогноз на день \
    и предупрежу, если ожидается плохая погода.";
pub const ALARM_ON: &str = "Оповещение включено";
pub const ALARM_OFF: &str = "Оповещение отключено";
pub const ALARM_FAILED: &str = "Не удалось включить оповещение";
pub const ENTER_TIME: &str = "Введите время в формате часы:минуты (14:48)";
pub const ENTER_COORDINATES: &str = "Введите координаты. Пример: 55.833333 37.616667";
pub const EMPTY_SCHEDULE: &str = "Расписание пусто";
pub const UNKNOWN_INPUT: &str = "Не понимаю. Воспользуйтесь меню или командой /start";

/// Callback payloads of the inline menus.
pub const CB_SCHEDULE: &str = "Schedule";
pub const CB_CHANGE_COORDINATES: &str = "ChangeCoord";
pub const CB_SCHEDULE_ADD: &str = "Add";
pub const CB_SCHEDULE_DEL: &str = "Del";

/// Reply-keyboard buttons, recognized by their label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Weather,
    Forecast,
    Settings,
    AlarmOn,
    AlarmOff,
}

impl MenuAction {
    pub fn from_label(text: &str) -> Option<Self> {
        match text.trim() {
            GET_WEATHER => Some(Self::Weather),
            GET_FORECAST => Some(Self::Forecast),
            SETTINGS => Some(Self::Settings),
            TURN_ON_ALARM => Some(Self::AlarmOn),
            TURN_OFF_ALARM => Some(Self::AlarmOff),
            _ => None,
        }
    }
}

pub fn outcome_text(outcome: &InputOutcome) -> String {
    match outcome {
        InputOutcome::NotAwaiting => UNKNOWN_INPUT.to_string(),
        InputOutcome::ScheduleAdded(at) => format!("Успешно добавлено: {at}"),
        InputOutcome::ScheduleReplaced(at) => format!("{at} уже было в расписании, запись заменена"),
        InputOutcome::ScheduleRemoved(at) => format!("Успешно удалено: {at}"),
        InputOutcome::ScheduleNotFound(at) => format!("{at} нет в расписании"),
        InputOutcome::CoordinatesChanged(coordinates) => format!("Успешно изменено: {coordinates}"),
        InputOutcome::FormatError(err) => format_error_text(err),
    }
}

fn format_error_text(err: &InputError) -> String {
    match err {
        InputError::TimeOfDay(_) => format!("Неверный формат данных. {ENTER_TIME}"),
        InputError::Coordinates(_) => format!("Неверный формат данных. {ENTER_COORDINATES}"),
    }
}
