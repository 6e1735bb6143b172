//! Debounce state machine
//!
//! `{NoTag, TagPresent(id)}` with a pure transition over the latest read.

use super::PresenceEvent;

/// What the reader remembers between polls
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DebounceState {
    #[default]
    NoTag,
    TagPresent(String),
}

/// One poll, reduced to what the debouncer cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Tag(String),
    NoTag,
    Failed(String),
}

/// Apply one observation to the remembered state
///
/// - new id (differs from remembered) → `Present`
/// - same id again → nothing
/// - id → none → `Absent`
/// - none → none → nothing
/// - failure → `Error`, state untouched
pub fn transition(
    state: &DebounceState,
    observation: Observation,
) -> (DebounceState, Option<PresenceEvent>) {
    match (state, observation) {
        (_, Observation::Failed(message)) => {
            (state.clone(), Some(PresenceEvent::Error { message }))
        }
        (DebounceState::TagPresent(current), Observation::Tag(id)) if *current == id => {
            (state.clone(), None)
        }
        (_, Observation::Tag(id)) => (
            DebounceState::TagPresent(id.clone()),
            Some(PresenceEvent::Present { tag_id: id }),
        ),
        (DebounceState::TagPresent(current), Observation::NoTag) => (
            DebounceState::NoTag,
            Some(PresenceEvent::Absent {
                tag_id: current.clone(),
            }),
        ),
        (DebounceState::NoTag, Observation::NoTag) => (DebounceState::NoTag, None),
    }
}
