use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use weather_core::{
    Coordinates, Coordinator, DayPart, Destination, Forecast, JobAction, Notifier, TimeOfDay, Timer,
    WeatherCondition, WeatherPoint, WeatherProvider, WindDirection, format::BAD_WEATHER_HEADLINE,
    timer,
};

const CHAT: Destination = Destination(7);

#[derive(Debug)]
struct StaticProvider(Vec<Forecast>);

#[async_trait]
impl WeatherProvider for StaticProvider {
    async fn current(&self, _coordinates: Coordinates) -> Result<WeatherPoint> {
        Ok(WeatherPoint {
            time: Utc::now(),
            temperature: 5,
            pressure: 750,
            condition: WeatherCondition::Clouds,
            wind_speed: 3.0,
            wind_direction: WindDirection::NW,
            humidity: 60,
        })
    }

    async fn forecast(&self, _coordinates: Coordinates) -> Result<Vec<Forecast>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Default)]
struct Inbox(Mutex<Vec<(Destination, String)>>);

#[async_trait]
impl Notifier for Inbox {
    async fn send(&self, destination: Destination, text: &str) -> Result<()> {
        self.0.lock().push((destination, text.to_string()));
        Ok(())
    }
}

fn part(part: DayPart, condition: WeatherCondition) -> Forecast {
    Forecast {
        part: Some(part),
        min_temperature: 1,
        max_temperature: 4,
        pressure: 748,
        condition,
        wind_speed: 5.0,
        wind_direction: WindDirection::S,
        humidity: 85,
    }
}

fn setup(forecasts: Vec<Forecast>) -> (Arc<Coordinator>, Arc<Inbox>) {
    let inbox = Arc::new(Inbox::default());
    let coordinator = Coordinator::new(
        Arc::new(StaticProvider(forecasts)),
        Arc::clone(&inbox) as Arc<dyn Notifier>,
        Coordinates::new(55.75, 37.62),
        Duration::from_secs(60),
    );
    (Arc::new(coordinator), inbox)
}

async fn drain(coordinator: &Arc<Coordinator>, jobs: mpsc::UnboundedReceiver<weather_core::Fired<JobAction>>) {
    let tracker = TaskTracker::new();
    Arc::clone(coordinator).run_jobs(jobs, tracker.clone()).await;
    tracker.close();
    tracker.wait().await;
}

#[tokio::test]
async fn alarm_and_schedule_fire_through_the_timer_channel() {
    let (coordinator, inbox) = setup(vec![
        part(DayPart::Morning, WeatherCondition::Clear),
        part(DayPart::Day, WeatherCondition::Thunderstorm),
        part(DayPart::Evening, WeatherCondition::Rain),
        part(DayPart::Night, WeatherCondition::Clear),
    ]);
    coordinator.enable_alarm(CHAT).unwrap();
    coordinator.add_schedule_entry(TimeOfDay::new(8, 0).unwrap(), CHAT);

    let registry = coordinator.registry();
    let (tx, rx) = mpsc::unbounded_channel();

    // Two days later both jobs are due, each exactly once.
    let later = Utc::now() + ChronoDuration::days(2);
    assert_eq!(timer::tick(&registry, &tx, later), 2);
    assert_eq!(timer::tick(&registry, &tx, later), 0);
    drop(tx);

    drain(&coordinator, rx).await;

    let sent = inbox.0.lock().clone();
    assert!(sent.iter().all(|(destination, _)| *destination == CHAT));

    let texts: Vec<&str> = sent.iter().map(|(_, text)| text.as_str()).collect();
    assert_eq!(texts.len(), 3);
    assert!(texts.contains(&BAD_WEATHER_HEADLINE));
    // The alarm reports the first bad day-part only.
    assert!(texts.iter().any(|t| t.starts_with("День\n⛈ Гроза")));
    assert!(texts.iter().any(|t| t.starts_with("Утро\n") && t.contains("Ночь\n")));
}

#[tokio::test]
async fn disabled_alarm_and_removed_entries_stay_silent() {
    let (coordinator, inbox) = setup(vec![part(DayPart::Morning, WeatherCondition::Snow)]);
    let nine = TimeOfDay::new(9, 0).unwrap();
    coordinator.enable_alarm(CHAT).unwrap();
    coordinator.add_schedule_entry(nine, CHAT);

    assert!(coordinator.disable_alarm());
    assert!(coordinator.remove_schedule_entry(nine));

    let registry = coordinator.registry();
    let (tx, rx) = mpsc::unbounded_channel();
    let later = Utc::now() + ChronoDuration::days(2);
    assert_eq!(timer::tick(&registry, &tx, later), 0);
    drop(tx);

    drain(&coordinator, rx).await;
    assert!(inbox.0.lock().is_empty());
}

#[tokio::test]
async fn timer_thread_stops_and_closes_the_channel() {
    let (coordinator, _inbox) = setup(vec![]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let token = CancellationToken::new();

    let timer = Timer::spawn(coordinator.registry(), tx, Duration::from_millis(5), token.clone()).unwrap();
    token.cancel();
    tokio::task::spawn_blocking(move || timer.stop()).await.unwrap();

    assert!(rx.recv().await.is_none());
}
