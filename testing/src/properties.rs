//! Proptest strategies for reservation command sequences.
//!
//! Commands address reservations by index into the list created so far, so a
//! shrunk sequence stays meaningful: an index past the end picks the last one.

use proptest::prelude::*;
use standbook_core::ReservationState;

/// Users that commands act as.
pub const USERS: [&str; 3] = ["alice", "bob", "carol"];

/// One step of a generated scenario.
#[derive(Clone, Debug)]
pub enum Command {
    /// Hold the space as `USERS[user]`
    Create {
        /// Index into [`USERS`]
        user: usize,
    },
    /// Refresh the hold of reservation `target`
    RefreshHold {
        /// Reservation index
        target: usize,
        /// Hold seconds, zero included
        ttl_secs: u64,
    },
    /// Admin confirms
    Confirm {
        /// Reservation index
        target: usize,
    },
    /// Admin rejects
    Reject {
        /// Reservation index
        target: usize,
    },
    /// Cancel as `USERS[user]`, or as an admin when `None`
    Cancel {
        /// Reservation index
        target: usize,
        /// Index into [`USERS`]
        user: Option<usize>,
    },
    /// Owner-side cancellation request as `USERS[user]`
    RequestCancellation {
        /// Reservation index
        target: usize,
        /// Index into [`USERS`]
        user: usize,
    },
    /// Admin approves a cancellation request
    Approve {
        /// Reservation index
        target: usize,
    },
    /// Admin denies a cancellation request
    Deny {
        /// Reservation index
        target: usize,
    },
    /// Hold marker lapsed
    Expire {
        /// Reservation index
        target: usize,
    },
}

impl Command {
    /// Reservation index targeted by this command, if any.
    #[must_use]
    pub const fn target(&self) -> Option<usize> {
        match self {
            Self::Create { .. } => None,
            Self::RefreshHold { target, .. }
            | Self::Confirm { target }
            | Self::Reject { target }
            | Self::Cancel { target, .. }
            | Self::RequestCancellation { target, .. }
            | Self::Approve { target }
            | Self::Deny { target }
            | Self::Expire { target } => Some(*target),
        }
    }
}

fn user() -> impl Strategy<Value = usize> {
    0..USERS.len()
}

fn target() -> impl Strategy<Value = usize> {
    0usize..8
}

/// Any single command. Creates are weighted up so sequences contend.
pub fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        3 => user().prop_map(|user| Command::Create { user }),
        1 => (target(), 0u64..120).prop_map(|(target, ttl_secs)| Command::RefreshHold { target, ttl_secs }),
        2 => target().prop_map(|target| Command::Confirm { target }),
        1 => target().prop_map(|target| Command::Reject { target }),
        1 => (target(), proptest::option::of(user()))
            .prop_map(|(target, user)| Command::Cancel { target, user }),
        2 => (target(), user()).prop_map(|(target, user)| Command::RequestCancellation { target, user }),
        1 => target().prop_map(|target| Command::Approve { target }),
        1 => target().prop_map(|target| Command::Deny { target }),
        2 => target().prop_map(|target| Command::Expire { target }),
    ]
}

/// Sequences of up to `max_len` commands.
pub fn commands(max_len: usize) -> impl Strategy<Value = Vec<Command>> {
    proptest::collection::vec(command(), 1..=max_len)
}

/// Any lifecycle state.
pub fn reservation_state() -> impl Strategy<Value = ReservationState> {
    prop_oneof![
        Just(ReservationState::Pending),
        Just(ReservationState::Reserved),
        Just(ReservationState::Expired),
        Just(ReservationState::Cancelled),
        Just(ReservationState::CancellationRequested),
    ]
}
