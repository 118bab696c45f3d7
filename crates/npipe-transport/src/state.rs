//! Handle role and lifecycle state.
//!
//! ```text
//! Created ──► Listening ──┐
//!        └──► Connected ──┴──► Stopping ──► Closed
//! ```
//!
//! `Closed` is terminal and can be reached from any state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Which end of a pipe a handle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Bound to a name and accepting connections.
    Listener,
    /// One end of an established connection.
    Connected,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Listener => f.write_str("listener"),
            Role::Connected => f.write_str("connected"),
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Created = 0,
    Listening = 1,
    Connected = 2,
    Stopping = 3,
    Closed = 4,
}

impl State {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => State::Created,
            1 => State::Listening,
            2 => State::Connected,
            3 => State::Stopping,
            _ => State::Closed,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Created => "created",
            State::Listening => "listening",
            State::Connected => "connected",
            State::Stopping => "stopping",
            State::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lock-free lifecycle cell shared by every thread holding the handle.
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    /// Cell for a handle whose endpoint is already bound or connected.
    pub(crate) fn open(role: Role) -> Self {
        let state = match role {
            Role::Listener => State::Listening,
            Role::Connected => State::Connected,
        };
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from → to`; fails with the observed state if it was not `from`.
    pub(crate) fn transition(&self, from: State, to: State) -> Result<(), State> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(State::from_u8)
    }

    /// Enter `Stopping` from an open state. Fails with the observed state if
    /// the cell is already `Stopping` or `Closed`.
    pub(crate) fn begin_stop(&self) -> Result<(), State> {
        let mut current = self.load();
        loop {
            match current {
                State::Stopping | State::Closed => return Err(current),
                _ => match self.transition(current, State::Stopping) {
                    Ok(()) => return Ok(()),
                    Err(observed) => current = observed,
                },
            }
        }
    }

    /// Mark closed; returns the previous state.
    pub(crate) fn close(&self) -> State {
        State::from_u8(self.0.swap(State::Closed as u8, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let state = AtomicState::open(Role::Listener);
        assert_eq!(state.load(), State::Listening);

        assert_eq!(state.begin_stop(), Ok(()));
        assert_eq!(state.load(), State::Stopping);
        assert_eq!(state.begin_stop(), Err(State::Stopping), "stop is idempotent");

        assert_eq!(state.close(), State::Stopping);
        assert_eq!(state.close(), State::Closed);
        assert_eq!(state.begin_stop(), Err(State::Closed), "closed is terminal");
    }

    #[test]
    fn open_starts_in_role_state() {
        assert_eq!(AtomicState::open(Role::Connected).load(), State::Connected);
        assert_eq!(AtomicState::open(Role::Listener).load(), State::Listening);
    }

    #[test]
    fn transition_reports_observed_state() {
        let state = AtomicState::open(Role::Connected);
        state.close();
        assert_eq!(
            state.transition(State::Connected, State::Stopping),
            Err(State::Closed)
        );
    }

    #[test]
    fn concurrent_stop_wins_once() {
        let state = std::sync::Arc::new(AtomicState::open(Role::Connected));

        let winners: usize = (0..8)
            .map(|_| {
                let state = std::sync::Arc::clone(&state);
                std::thread::spawn(move || state.begin_stop().is_ok())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| usize::from(t.join().unwrap()))
            .sum();

        assert_eq!(winners, 1);
        assert_eq!(state.load(), State::Stopping);
    }
}
