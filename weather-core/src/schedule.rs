//! Registry of timed jobs.
//!
//! Jobs are either daily (fire once a day at a wall-clock [`TimeOfDay`]) or
//! interval based (fire every fixed duration). The registry never runs
//! anything itself: [`JobRegistry::run_pending`] hands back the actions that
//! are due and moves their next fire time forward. Executing them is up to
//! the caller, see [`crate::timer`].
//!
//! Daily jobs are also indexed by their time of day, which is unique: adding a
//! second job at the same time replaces the first.
//!
//! Fire times are UTC instants, so interval jobs keep their cadence across
//! daylight-saving changes. Only the wall-clock time of a daily job is
//! resolved through the registry's time zone.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, FixedOffset, Local, TimeZone, Utc};

use crate::{error::ScheduleError, input::TimeOfDay};

/// Opaque identity of a scheduled job. Never reused within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    DailyAt(TimeOfDay),
    Interval(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRegistration {
    pub handle: JobHandle,
    /// A job already existed at this time of day and was cancelled.
    pub replaced: bool,
}

/// Time zone daily jobs are read in.
#[derive(Debug, Clone, Copy)]
enum WallClock {
    Local,
    Fixed(FixedOffset),
}

impl WallClock {
    fn next_daily(self, at: TimeOfDay, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            WallClock::Local => next_daily(&Local, at, now),
            WallClock::Fixed(offset) => next_daily(&offset, at, now),
        }
    }
}

#[derive(Debug)]
struct Job<A> {
    trigger: Trigger,
    next_fire: DateTime<Utc>,
    action: A,
}

#[derive(Debug)]
pub struct JobRegistry<A> {
    next_id: u64,
    clock: WallClock,
    /// `now` of the previous `run_pending`, to notice a clock stepped backwards.
    last_run: Option<DateTime<Utc>>,
    jobs: HashMap<JobHandle, Job<A>>,
    /// Fire queue ordered by time, then by handle for jobs due at the same instant.
    queue: BTreeSet<(DateTime<Utc>, JobHandle)>,
    daily: BTreeMap<TimeOfDay, JobHandle>,
}

impl<A> Default for JobRegistry<A> {
    fn default() -> Self {
        Self::with_clock(WallClock::Local)
    }
}

impl<A> JobRegistry<A> {
    /// Registry whose daily jobs follow the system time zone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose daily jobs follow a fixed UTC offset.
    pub fn with_utc_offset(offset: FixedOffset) -> Self {
        Self::with_clock(WallClock::Fixed(offset))
    }

    fn with_clock(clock: WallClock) -> Self {
        Self {
            next_id: 0,
            clock,
            last_run: None,
            jobs: HashMap::new(),
            queue: BTreeSet::new(),
            daily: BTreeMap::new(),
        }
    }

    /// Register a job firing every day at `at`. The first fire is today if
    /// `at` is still ahead of `now`, tomorrow otherwise.
    pub fn add_daily(&mut self, at: TimeOfDay, now: DateTime<Utc>, action: A) -> DailyRegistration {
        let replaced = self.cancel_daily(at);
        let first = self.clock.next_daily(at, now);
        let handle = self.insert(Trigger::DailyAt(at), first, action);
        self.daily.insert(at, handle);

        DailyRegistration { handle, replaced }
    }

    /// Register a job firing every `every`, first at `now + every`.
    pub fn add_interval(
        &mut self,
        every: std::time::Duration,
        now: DateTime<Utc>,
        action: A,
    ) -> Result<JobHandle, ScheduleError> {
        if every.is_zero() {
            return Err(ScheduleError::ZeroInterval);
        }
        let interval =
            Duration::from_std(every).map_err(|_| ScheduleError::IntervalTooLong(every))?;
        let first = now
            .checked_add_signed(interval)
            .ok_or(ScheduleError::IntervalTooLong(every))?;

        Ok(self.insert(Trigger::Interval(interval), first, action))
    }

    /// Remove a job. Returns `false` if it was not registered (already
    /// cancelled, or never existed).
    pub fn cancel(&mut self, handle: JobHandle) -> bool {
        let Some(job) = self.jobs.remove(&handle) else {
            return false;
        };
        self.queue.remove(&(job.next_fire, handle));
        if let Trigger::DailyAt(at) = job.trigger {
            if self.daily.get(&at) == Some(&handle) {
                self.daily.remove(&at);
            }
        }
        true
    }

    /// Remove the daily job registered at `at`, if any.
    pub fn cancel_daily(&mut self, at: TimeOfDay) -> bool {
        match self.daily.get(&at).copied() {
            Some(handle) => self.cancel(handle),
            None => false,
        }
    }

    /// Times of all daily jobs, ascending.
    pub fn list_daily(&self) -> Vec<TimeOfDay> {
        self.daily.keys().copied().collect()
    }

    pub fn daily_handle(&self, at: TimeOfDay) -> Option<JobHandle> {
        self.daily.get(&at).copied()
    }

    pub fn contains(&self, handle: JobHandle) -> bool {
        self.jobs.contains_key(&handle)
    }

    pub fn next_fire(&self, handle: JobHandle) -> Option<DateTime<Utc>> {
        self.jobs.get(&handle).map(|job| job.next_fire)
    }

    pub fn trigger(&self, handle: JobHandle) -> Option<Trigger> {
        self.jobs.get(&handle).map(|job| job.trigger)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Collect the action of every job due at `now`, in fire order, and
    /// reschedule each of them. A job is returned at most once per call.
    pub fn run_pending(&mut self, now: DateTime<Utc>) -> Vec<(JobHandle, A)>
    where
        A: Clone,
    {
        if self.last_run.is_some_and(|last| now < last) {
            self.rebase_intervals(now);
        }
        self.last_run = Some(now);

        let clock = self.clock;
        let mut due = Vec::new();
        while let Some(&(fire_at, handle)) = self.queue.first() {
            if fire_at > now {
                break;
            }
            self.queue.pop_first();
            due.push((fire_at, handle));
        }

        let mut fired = Vec::with_capacity(due.len());
        for (fire_at, handle) in due {
            let Some(job) = self.jobs.get_mut(&handle) else {
                continue;
            };
            job.next_fire = match job.trigger {
                Trigger::DailyAt(at) => clock.next_daily(at, now),
                Trigger::Interval(every) => next_interval(fire_at, every, now),
            };
            self.queue.insert((job.next_fire, handle));
            fired.push((handle, job.action.clone()));
        }

        fired
    }

    /// After the clock went backwards, pull interval jobs that are now more
    /// than one period away back to `now + every`.
    fn rebase_intervals(&mut self, now: DateTime<Utc>) {
        for (&handle, job) in self.jobs.iter_mut() {
            let Trigger::Interval(every) = job.trigger else {
                continue;
            };
            let Some(limit) = now.checked_add_signed(every) else {
                continue;
            };
            if job.next_fire > limit {
                tracing::warn!(?handle, from = %job.next_fire, to = %limit, "clock went backwards, rescheduling");
                self.queue.remove(&(job.next_fire, handle));
                job.next_fire = limit;
                self.queue.insert((limit, handle));
            }
        }
    }

    fn insert(&mut self, trigger: Trigger, next_fire: DateTime<Utc>, action: A) -> JobHandle {
        let handle = JobHandle(self.next_id);
        self.next_id += 1;

        self.queue.insert((next_fire, handle));
        self.jobs.insert(handle, Job { trigger, next_fire, action });
        handle
    }
}

/// First occurrence of the wall-clock time `at` in `tz` strictly after `now`.
///
/// A time repeated by a fall-back resolves to its first instant still ahead;
/// a time skipped by a spring-forward fires an hour later.
fn next_daily<Tz: TimeZone>(tz: &Tz, at: TimeOfDay, now: DateTime<Utc>) -> DateTime<Utc> {
    let wall_now = now.with_timezone(tz).naive_local();
    let today = wall_now.date().and_time(at.as_naive_time());
    let first = if today > wall_now { today } else { today + Duration::days(1) };

    [first, first + Duration::hours(1), first + Duration::days(1)]
        .into_iter()
        .find_map(|wall| {
            let resolved = tz.from_local_datetime(&wall);
            [resolved.clone().earliest(), resolved.latest()]
                .into_iter()
                .flatten()
                .map(|instant| instant.with_timezone(&Utc))
                .find(|instant| *instant > now)
        })
        .unwrap_or(now + Duration::days(1))
}

/// Keep the fixed cadence, unless the loop fell so far behind that the next
/// slot is already in the past.
fn next_interval(fired_at: DateTime<Utc>, every: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
    match fired_at.checked_add_signed(every) {
        Some(next) if next > now => next,
        _ => now + every,
    }
}
