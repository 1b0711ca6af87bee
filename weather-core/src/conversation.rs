//! Per-session pending input.
//!
//! Each chat has a single slot describing what its next free-text message
//! means. A slot is consumed by exactly one message and then goes back to
//! [`ConversationState::Idle`], whether the input parsed or not.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{
    coordinator::Coordinator,
    error::InputError,
    input::{TimeOfDay, parse_coordinates, parse_time_of_day},
    model::Coordinates,
    notify::Destination,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingScheduleAddTime,
    AwaitingScheduleDelTime,
    AwaitingNewCoordinates,
}

/// Result of feeding one free-text message to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    /// The session was idle; the text was not consumed.
    NotAwaiting,
    ScheduleAdded(TimeOfDay),
    /// The time was already scheduled; the old entry was replaced.
    ScheduleReplaced(TimeOfDay),
    ScheduleRemoved(TimeOfDay),
    ScheduleNotFound(TimeOfDay),
    CoordinatesChanged(Coordinates),
    FormatError(InputError),
}

#[derive(Debug, Default)]
pub struct Conversations {
    states: Mutex<HashMap<Destination, ConversationState>>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for input in `session`, dropping whatever was pending before.
    /// Idle sessions hold no entry.
    pub fn begin(&self, session: Destination, state: ConversationState) {
        let mut states = self.states.lock();
        let previous = match state {
            ConversationState::Idle => states.remove(&session),
            _ => states.insert(session, state),
        };
        drop(states);
        tracing::debug!(%session, ?previous, ?state, "conversation state set");
    }

    pub fn state(&self, session: Destination) -> ConversationState {
        self.states.lock().get(&session).copied().unwrap_or_default()
    }

    pub fn reset(&self, session: Destination) {
        self.begin(session, ConversationState::Idle);
    }

    /// Interpret `text` according to the session's pending state and apply it.
    /// The session is idle afterwards in every case.
    pub fn consume(&self, session: Destination, text: &str, coordinator: &Coordinator) -> InputOutcome {
        let state = self.states.lock().remove(&session).unwrap_or_default();

        let outcome = match state {
            ConversationState::Idle => InputOutcome::NotAwaiting,
            ConversationState::AwaitingScheduleAddTime => match parse_time_of_day(text) {
                Ok(at) => {
                    if coordinator.add_schedule_entry(at, session).replaced {
                        InputOutcome::ScheduleReplaced(at)
                    } else {
                        InputOutcome::ScheduleAdded(at)
                    }
                }
                Err(err) => InputOutcome::FormatError(err),
            },
            ConversationState::AwaitingScheduleDelTime => match parse_time_of_day(text) {
                Ok(at) if coordinator.remove_schedule_entry(at) => InputOutcome::ScheduleRemoved(at),
                Ok(at) => InputOutcome::ScheduleNotFound(at),
                Err(err) => InputOutcome::FormatError(err),
            },
            ConversationState::AwaitingNewCoordinates => match parse_coordinates(text) {
                Ok(coordinates) => {
                    coordinator.set_coordinates(coordinates);
                    InputOutcome::CoordinatesChanged(coordinates)
                }
                Err(err) => InputOutcome::FormatError(err),
            },
        };

        tracing::debug!(%session, ?state, ?outcome, "conversation input consumed");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::{FakeProvider, RecordingNotifier};
    use std::{sync::Arc, time::Duration};

    const ALICE: Destination = Destination(1);
    const BOB: Destination = Destination(2);

    fn coordinator() -> Coordinator {
        Coordinator::new(
            FakeProvider::with(vec![]),
            Arc::new(RecordingNotifier::default()),
            Coordinates::new(55.75, 37.62),
            Duration::from_secs(60),
        )
    }

    fn tod(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn new_sessions_are_idle() {
        let conversations = Conversations::new();
        let c = coordinator();

        assert_eq!(conversations.state(ALICE), ConversationState::Idle);
        assert_eq!(conversations.consume(ALICE, "14:48", &c), InputOutcome::NotAwaiting);
        assert!(c.schedule_entries().is_empty());
    }

    #[test]
    fn add_time_schedules_entry_and_returns_to_idle() {
        let conversations = Conversations::new();
        let c = coordinator();

        conversations.begin(ALICE, ConversationState::AwaitingScheduleAddTime);
        let outcome = conversations.consume(ALICE, "14:48", &c);

        assert_eq!(outcome, InputOutcome::ScheduleAdded(tod("14:48")));
        assert_eq!(c.schedule_entries(), vec![tod("14:48")]);
        assert_eq!(conversations.state(ALICE), ConversationState::Idle);
    }

    #[test]
    fn adding_existing_time_is_reported_as_replacement() {
        let conversations = Conversations::new();
        let c = coordinator();
        c.add_schedule_entry(tod("08:00"), ALICE);

        conversations.begin(ALICE, ConversationState::AwaitingScheduleAddTime);
        let outcome = conversations.consume(ALICE, "8:00", &c);

        assert_eq!(outcome, InputOutcome::ScheduleReplaced(tod("08:00")));
        assert_eq!(c.schedule_entries(), vec![tod("08:00")]);
    }

    #[test]
    fn bad_time_is_a_format_error_without_side_effects() {
        let conversations = Conversations::new();
        let c = coordinator();

        conversations.begin(ALICE, ConversationState::AwaitingScheduleAddTime);
        let outcome = conversations.consume(ALICE, "25:00", &c);

        assert_eq!(outcome, InputOutcome::FormatError(InputError::TimeOfDay("25:00".into())));
        assert!(c.schedule_entries().is_empty());
        assert_eq!(conversations.state(ALICE), ConversationState::Idle);

        // No retry: the next message is not treated as a time.
        assert_eq!(conversations.consume(ALICE, "14:00", &c), InputOutcome::NotAwaiting);
    }

    #[test]
    fn delete_time_reports_missing_entries() {
        let conversations = Conversations::new();
        let c = coordinator();
        c.add_schedule_entry(tod("09:00"), ALICE);

        conversations.begin(ALICE, ConversationState::AwaitingScheduleDelTime);
        assert_eq!(conversations.consume(ALICE, "09:00", &c), InputOutcome::ScheduleRemoved(tod("09:00")));
        assert!(c.schedule_entries().is_empty());

        conversations.begin(ALICE, ConversationState::AwaitingScheduleDelTime);
        assert_eq!(conversations.consume(ALICE, "09:00", &c), InputOutcome::ScheduleNotFound(tod("09:00")));
    }

    #[test]
    fn coordinates_are_replaced() {
        let conversations = Conversations::new();
        let c = coordinator();

        conversations.begin(ALICE, ConversationState::AwaitingNewCoordinates);
        let outcome = conversations.consume(ALICE, "59.94 30.31", &c);

        let expected = Coordinates::new(59.94, 30.31);
        assert_eq!(outcome, InputOutcome::CoordinatesChanged(expected));
        assert_eq!(c.coordinates(), expected);
    }

    #[test]
    fn bad_coordinates_keep_previous_ones() {
        let conversations = Conversations::new();
        let c = coordinator();
        let before = c.coordinates();

        conversations.begin(ALICE, ConversationState::AwaitingNewCoordinates);
        let outcome = conversations.consume(ALICE, "59.94", &c);

        assert!(matches!(outcome, InputOutcome::FormatError(InputError::Coordinates(_))));
        assert_eq!(c.coordinates(), before);
    }

    #[test]
    fn entering_a_new_state_discards_the_pending_one() {
        let conversations = Conversations::new();
        let c = coordinator();

        conversations.begin(ALICE, ConversationState::AwaitingNewCoordinates);
        conversations.begin(ALICE, ConversationState::AwaitingScheduleAddTime);

        assert_eq!(conversations.consume(ALICE, "10:15", &c), InputOutcome::ScheduleAdded(tod("10:15")));
    }

    #[test]
    fn sessions_are_independent() {
        let conversations = Conversations::new();
        let c = coordinator();

        conversations.begin(ALICE, ConversationState::AwaitingScheduleAddTime);

        assert_eq!(conversations.state(BOB), ConversationState::Idle);
        assert_eq!(conversations.consume(BOB, "10:15", &c), InputOutcome::NotAwaiting);
        assert_eq!(conversations.state(ALICE), ConversationState::AwaitingScheduleAddTime);
    }

    #[test]
    fn reset_cancels_pending_input() {
        let conversations = Conversations::new();
        let c = coordinator();

        conversations.begin(ALICE, ConversationState::AwaitingScheduleDelTime);
        conversations.reset(ALICE);

        assert_eq!(conversations.consume(ALICE, "10:15", &c), InputOutcome::NotAwaiting);
    }

    #[test]
    fn idle_sessions_leave_no_entry_behind() {
        let conversations = Conversations::new();
        let c = coordinator();

        for chat in 0..1000 {
            conversations.reset(Destination(chat));
            assert_eq!(conversations.consume(Destination(chat), "hello", &c), InputOutcome::NotAwaiting);
        }
        assert!(conversations.states.lock().is_empty());

        conversations.begin(ALICE, ConversationState::AwaitingScheduleAddTime);
        conversations.begin(BOB, ConversationState::AwaitingNewCoordinates);
        conversations.reset(BOB);
        conversations.consume(ALICE, "07:30", &c);

        assert!(conversations.states.lock().is_empty());
        assert_eq!(conversations.state(ALICE), ConversationState::Idle);
    }
}
