//! Telegram front-end: commands, reply and inline menus, and delivery of
//! scheduled messages.

use std::{error::Error, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use teloxide::{
    dispatching::{ShutdownToken, UpdateHandler},
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup},
    update_listeners::{Polling, PollingBuilder},
    utils::command::BotCommands,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use weather_core::{
    ConversationState, Conversations, Coordinator, Destination, Notifier, Settings, TimeOfDay,
    Timer, WeatherProvider,
    format::{FORECAST_UNAVAILABLE, WEATHER_UNAVAILABLE, format_forecasts, format_weather},
};

use crate::text::{self, MenuAction};

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

const SHUTDOWN_RETRY: Duration = Duration::from_millis(50);

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "начать работу с ботом")]
    Start,
    #[command(description = "текущая погода")]
    Current,
    #[command(description = "прогноз на день")]
    Forecast,
    #[command(description = "включить/выключить предупреждение о плохой погоде")]
    Alarm,
    #[command(description = "настройки")]
    Settings,
}

/// State shared by every handler.
#[derive(Debug)]
pub struct App {
    coordinator: Arc<Coordinator>,
    conversations: Conversations,
}

/// Delivers job output as plain chat messages.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, destination: Destination, text: &str) -> anyhow::Result<()> {
        self.bot
            .send_message(ChatId(destination.0), text)
            .await
            .with_context(|| format!("Failed to send message to chat {destination}"))?;
        Ok(())
    }
}

/// Run the bot until SIGINT or SIGTERM, then stop the timer and let
/// submitted jobs finish.
pub async fn run(settings: Settings, provider: Arc<dyn WeatherProvider>) -> anyhow::Result<()> {
    let bot = Bot::new(&settings.telegram_token);

    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!(error = %err, "failed to register command list");
    }

    let notifier = Arc::new(TelegramNotifier { bot: bot.clone() });
    let coordinator = Arc::new(Coordinator::new(
        provider,
        notifier,
        settings.coordinates,
        settings.alarm_interval,
    ));

    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
    let timer = Timer::spawn(coordinator.registry(), jobs_tx, settings.tick, CancellationToken::new())?;
    let tracker = TaskTracker::new();
    let runner = tokio::spawn(Arc::clone(&coordinator).run_jobs(jobs_rx, tracker.clone()));

    let app = Arc::new(App { coordinator, conversations: Conversations::new() });
    let listener = update_listener(bot.clone()).build();
    let mut dispatcher = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![app])
        .build();

    let stop = CancellationToken::new();
    let stopper = stop_dispatcher_on(stop.clone(), dispatcher.shutdown_token());
    let signals = tokio::spawn({
        let stop = stop.clone();
        async move {
            wait_for_signal().await;
            tracing::info!("shutdown requested");
            stop.cancel();
        }
    });

    if stop.is_cancelled() {
        tracing::info!("shutdown requested before polling started");
    } else {
        tracing::info!(coordinates = %settings.coordinates, provider = %settings.provider, "bot started");
        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
    }
    signals.abort();
    stopper.abort();

    tokio::task::spawn_blocking(move || timer.stop())
        .await
        .context("Failed to stop scheduler timer")?;
    runner.await.context("Job runner failed")?;
    tracker.close();
    tracker.wait().await;

    tracing::info!("bot stopped");
    Ok(())
}

/// Long polling that skips updates queued while the bot was offline.
fn update_listener(bot: Bot) -> PollingBuilder<Bot> {
    Polling::builder(bot).drop_pending_updates()
}

/// Once `stop` fires, keep asking the dispatcher to shut down until it
/// accepts. A request made before polling starts is not lost.
fn stop_dispatcher_on(stop: CancellationToken, shutdown: ShutdownToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        stop.cancelled().await;
        loop {
            match shutdown.shutdown() {
                Ok(stopped) => {
                    stopped.await;
                    break;
                }
                Err(_) => tokio::time::sleep(SHUTDOWN_RETRY).await,
            }
        }
    })
}

fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler))
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn session(chat: ChatId) -> Destination {
    Destination(chat.0)
}

#[tracing::instrument(skip_all, fields(chat = msg.chat.id.0, ?cmd))]
async fn command_handler(bot: Bot, msg: Message, cmd: Command, app: Arc<App>) -> HandlerResult {
    let chat = msg.chat.id;
    app.conversations.reset(session(chat));

    match cmd {
        Command::Start => {
            bot.send_message(chat, text::GREETING)
                .reply_markup(main_keyboard(app.coordinator.alarm_enabled()))
                .await?;
        }
        Command::Current => send_current(&bot, chat, &app).await?,
        Command::Forecast => send_forecast(&bot, chat, &app).await?,
        Command::Alarm => {
            let enable = !app.coordinator.alarm_enabled();
            toggle_alarm(&bot, chat, &app, enable).await?;
        }
        Command::Settings => send_settings(&bot, chat).await?,
    }
    Ok(())
}

#[tracing::instrument(skip_all, fields(chat = msg.chat.id.0))]
async fn message_handler(bot: Bot, msg: Message, app: Arc<App>) -> HandlerResult {
    let chat = msg.chat.id;
    let Some(input) = msg.text() else {
        tracing::debug!("ignoring non-text message");
        return Ok(());
    };

    if let Some(action) = MenuAction::from_label(input) {
        app.conversations.reset(session(chat));
        match action {
            MenuAction::Weather => send_current(&bot, chat, &app).await?,
            MenuAction::Forecast => send_forecast(&bot, chat, &app).await?,
            MenuAction::Settings => send_settings(&bot, chat).await?,
            MenuAction::AlarmOn => toggle_alarm(&bot, chat, &app, true).await?,
            MenuAction::AlarmOff => toggle_alarm(&bot, chat, &app, false).await?,
        }
        return Ok(());
    }

    let outcome = app.conversations.consume(session(chat), input, &app.coordinator);
    tracing::info!(?outcome, "free-text input handled");

    bot.send_message(chat, text::outcome_text(&outcome))
        .reply_markup(main_keyboard(app.coordinator.alarm_enabled()))
        .await?;
    Ok(())
}

#[tracing::instrument(skip_all, fields(data = ?q.data))]
async fn callback_handler(bot: Bot, q: CallbackQuery, app: Arc<App>) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };
    let chat = message.chat().id;

    match data {
        text::CB_SCHEDULE => {
            let entries = app.coordinator.schedule_entries();
            let title = if entries.is_empty() { text::EMPTY_SCHEDULE } else { text::SCHEDULE };
            bot.send_message(chat, title)
                .reply_markup(schedule_keyboard(&entries))
                .await?;
        }
        text::CB_SCHEDULE_ADD => {
            app.conversations.begin(session(chat), ConversationState::AwaitingScheduleAddTime);
            bot.send_message(chat, text::ENTER_TIME).await?;
        }
        text::CB_SCHEDULE_DEL => {
            app.conversations.begin(session(chat), ConversationState::AwaitingScheduleDelTime);
            bot.send_message(chat, text::ENTER_TIME).await?;
        }
        text::CB_CHANGE_COORDINATES => {
            app.conversations.begin(session(chat), ConversationState::AwaitingNewCoordinates);
            bot.send_message(chat, text::ENTER_COORDINATES).await?;
        }
        // Schedule entry buttons are informational.
        other => tracing::debug!(data = other, "callback without action"),
    }
    Ok(())
}

async fn send_current(bot: &Bot, chat: ChatId, app: &App) -> HandlerResult {
    let reply = match app.coordinator.current_weather().await {
        Ok(weather) => format_weather(&weather),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "current weather unavailable");
            WEATHER_UNAVAILABLE.to_string()
        }
    };
    bot.send_message(chat, reply).await?;
    Ok(())
}

async fn send_forecast(bot: &Bot, chat: ChatId, app: &App) -> HandlerResult {
    let reply = match app.coordinator.forecast().await {
        Ok(forecasts) => format_forecasts(&forecasts),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "forecast unavailable");
            FORECAST_UNAVAILABLE.to_string()
        }
    };
    bot.send_message(chat, reply).await?;
    Ok(())
}

async fn toggle_alarm(bot: &Bot, chat: ChatId, app: &App, enable: bool) -> HandlerResult {
    let reply = if !enable {
        app.coordinator.disable_alarm();
        text::ALARM_OFF
    } else {
        match app.coordinator.enable_alarm(session(chat)) {
            Ok(_) => text::ALARM_ON,
            Err(err) => {
                tracing::error!(error = %err, "failed to enable alarm");
                text::ALARM_FAILED
            }
        }
    };

    bot.send_message(chat, reply)
        .reply_markup(main_keyboard(app.coordinator.alarm_enabled()))
        .await?;
    Ok(())
}

async fn send_settings(bot: &Bot, chat: ChatId) -> HandlerResult {
    bot.send_message(chat, text::SETTINGS)
        .reply_markup(settings_keyboard())
        .await?;
    Ok(())
}

/// Main reply keyboard; the alarm button offers the opposite of the current state.
fn main_keyboard(alarm_enabled: bool) -> KeyboardMarkup {
    let alarm = if alarm_enabled { text::TURN_OFF_ALARM } else { text::TURN_ON_ALARM };

    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(text::GET_WEATHER), KeyboardButton::new(text::GET_FORECAST)],
        vec![KeyboardButton::new(text::SETTINGS), KeyboardButton::new(alarm)],
    ])
    .resize_keyboard()
}

fn settings_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(text::SCHEDULE, text::CB_SCHEDULE)],
        vec![InlineKeyboardButton::callback(
            text::CHANGE_COORDINATES,
            text::CB_CHANGE_COORDINATES,
        )],
    ])
}

/// One row per entry in ascending order, then add and delete.
fn schedule_keyboard(entries: &[TimeOfDay]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = entries
        .iter()
        .map(|at| {
            let label = at.to_string();
            vec![InlineKeyboardButton::callback(label.clone(), label)]
        })
        .collect();

    rows.push(vec![InlineKeyboardButton::callback(text::SCHEDULE_ADD, text::CB_SCHEDULE_ADD)]);
    rows.push(vec![InlineKeyboardButton::callback(text::SCHEDULE_DEL, text::CB_SCHEDULE_DEL)]);

    InlineKeyboardMarkup::new(rows)
}
