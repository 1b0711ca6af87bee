//! Alarm and schedule coordinator.
//!
//! Owns the process-wide session state (current coordinates, alarm job) and
//! the job registry shared with the timer thread. User actions arrive from
//! the chat handlers; fired jobs come back through [`Coordinator::run_jobs`].
//!
//! Locking: session state is always locked before the registry, and no lock
//! is held across an `.await`.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::{
    alarm,
    error::ScheduleError,
    format::{BAD_WEATHER_HEADLINE, FORECAST_UNAVAILABLE, format_forecast, format_forecasts},
    input::TimeOfDay,
    model::{Coordinates, Forecast, WeatherPoint},
    notify::{Destination, Notifier},
    provider::WeatherProvider,
    schedule::{DailyRegistration, JobHandle, JobRegistry},
    timer::{Fired, SharedRegistry},
};

/// What a scheduled job does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    /// Look for bad weather in today's forecast and warn the destination.
    AlarmCheck { destination: Destination },
    /// Send the full forecast to the destination.
    DeliverForecast { destination: Destination },
}

#[derive(Debug)]
struct SessionState {
    coordinates: Coordinates,
    alarm: Option<JobHandle>,
}

#[derive(Debug)]
pub struct Coordinator {
    provider: Arc<dyn WeatherProvider>,
    notifier: Arc<dyn Notifier>,
    registry: SharedRegistry<JobAction>,
    state: Mutex<SessionState>,
    alarm_interval: Duration,
}

impl Coordinator {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        notifier: Arc<dyn Notifier>,
        coordinates: Coordinates,
        alarm_interval: Duration,
    ) -> Self {
        Self {
            provider,
            notifier,
            registry: Arc::new(Mutex::new(JobRegistry::new())),
            state: Mutex::new(SessionState { coordinates, alarm: None }),
            alarm_interval,
        }
    }

    /// Registry handle for the timer thread.
    pub fn registry(&self) -> SharedRegistry<JobAction> {
        Arc::clone(&self.registry)
    }

    pub fn coordinates(&self) -> Coordinates {
        self.state.lock().coordinates
    }

    pub fn set_coordinates(&self, coordinates: Coordinates) {
        self.state.lock().coordinates = coordinates;
        tracing::info!(%coordinates, "coordinates changed");
    }

    pub fn alarm_enabled(&self) -> bool {
        self.state.lock().alarm.is_some()
    }

    /// Start periodic bad-weather checks for `destination`. Enabling again
    /// replaces the running job, so there is never more than one.
    pub fn enable_alarm(&self, destination: Destination) -> Result<JobHandle, ScheduleError> {
        let mut state = self.state.lock();
        let mut registry = self.registry.lock();

        if let Some(previous) = state.alarm.take() {
            registry.cancel(previous);
        }
        let handle = registry.add_interval(
            self.alarm_interval,
            now(),
            JobAction::AlarmCheck { destination },
        )?;
        state.alarm = Some(handle);

        tracing::info!(?handle, %destination, interval = ?self.alarm_interval, "alarm enabled");
        Ok(handle)
    }

    /// Stop bad-weather checks. Returns whether an alarm was running.
    pub fn disable_alarm(&self) -> bool {
        let mut state = self.state.lock();
        let Some(handle) = state.alarm.take() else {
            return false;
        };
        self.registry.lock().cancel(handle);

        tracing::info!(?handle, "alarm disabled");
        true
    }

    /// Deliver the forecast to `destination` every day at `at`.
    pub fn add_schedule_entry(&self, at: TimeOfDay, destination: Destination) -> DailyRegistration {
        let registration = self
            .registry
            .lock()
            .add_daily(at, now(), JobAction::DeliverForecast { destination });

        tracing::info!(time = %at, replaced = registration.replaced, "schedule entry added");
        registration
    }

    /// Returns `false` when nothing was scheduled at `at`.
    pub fn remove_schedule_entry(&self, at: TimeOfDay) -> bool {
        let removed = self.registry.lock().cancel_daily(at);
        tracing::info!(time = %at, removed, "schedule entry removal");
        removed
    }

    pub fn schedule_entries(&self) -> Vec<TimeOfDay> {
        self.registry.lock().list_daily()
    }

    pub async fn current_weather(&self) -> anyhow::Result<WeatherPoint> {
        let coordinates = self.coordinates();
        self.provider.current(coordinates).await
    }

    pub async fn forecast(&self) -> anyhow::Result<Vec<Forecast>> {
        let coordinates = self.coordinates();
        self.provider.forecast(coordinates).await
    }

    /// Execute a fired job. Errors are logged and never propagate, so one bad
    /// run cannot take the job or the runner down.
    pub async fn run_job(&self, action: JobAction) {
        match action {
            JobAction::AlarmCheck { destination } => self.check_bad_weather(destination).await,
            JobAction::DeliverForecast { destination } => self.deliver_forecast(destination).await,
        }
    }

    /// Consume fired jobs until every sender is gone, running each one as a
    /// separate task on `tracker`.
    pub async fn run_jobs(
        self: Arc<Self>,
        mut jobs: UnboundedReceiver<Fired<JobAction>>,
        tracker: TaskTracker,
    ) {
        while let Some(Fired { handle, action }) = jobs.recv().await {
            let coordinator = Arc::clone(&self);
            let span = tracing::info_span!("job", ?handle);
            tracker.spawn(async move { coordinator.run_job(action).await }.instrument(span));
        }
        tracing::debug!("job channel closed, runner exiting");
    }

    async fn check_bad_weather(&self, destination: Destination) {
        let forecasts = match self.forecast().await {
            Ok(forecasts) => forecasts,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "bad weather check skipped");
                return;
            }
        };

        let Some(bad) = alarm::evaluate(&forecasts) else {
            tracing::debug!("no bad weather ahead");
            return;
        };

        tracing::info!(condition = ?bad.condition, part = ?bad.part, %destination, "bad weather ahead");
        self.notify(destination, BAD_WEATHER_HEADLINE).await;
        self.notify(destination, &format_forecast(bad)).await;
    }

    async fn deliver_forecast(&self, destination: Destination) {
        match self.forecast().await {
            Ok(forecasts) => self.notify(destination, &format_forecasts(&forecasts)).await,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), %destination, "scheduled forecast unavailable");
                self.notify(destination, FORECAST_UNAVAILABLE).await;
            }
        }
    }

    async fn notify(&self, destination: Destination, text: &str) {
        if let Err(err) = self.notifier.send(destination, text).await {
            tracing::error!(error = %format!("{err:#}"), %destination, "failed to send message");
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}
