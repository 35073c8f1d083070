//! Finite-state machines for chat rooms and support tickets.
//!
//! Both the server mutators and the client's optimistic updates go through
//! these tables, so a transition the server would reject is never shown
//! locally either.

use crate::schema::{RoomStatus, TicketStatus};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomTransition {
    /// An agent takes a waiting room.
    Claim,
    /// The assigned agent hands the room back to the queue.
    ReturnToQueue,
    /// The assigned agent finishes their part; the room goes back to waiting.
    Conclude,
    /// The customer's connection went away.
    CustomerDisconnect,
    /// The customer explicitly ended the chat.
    CustomerClose,
    /// The customer re-engages with a waiting or concluded room.
    Reactivate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketTransition {
    Claim,
    AwaitCustomer,
    Resume,
    Resolve,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: String,
    pub attempted: String,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "cannot {} from status {}", self.attempted, self.from)
    }
}

impl StdError for TransitionError {}

impl fmt::Display for RoomTransition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RoomTransition::Claim => "claim",
            RoomTransition::ReturnToQueue => "return_to_queue",
            RoomTransition::Conclude => "conclude",
            RoomTransition::CustomerDisconnect => "customer_disconnect",
            RoomTransition::CustomerClose => "customer_close",
            RoomTransition::Reactivate => "reactivate",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for TicketTransition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TicketTransition::Claim => "claim",
            TicketTransition::AwaitCustomer => "await_customer",
            TicketTransition::Resume => "resume",
            TicketTransition::Resolve => "resolve",
            TicketTransition::Close => "close",
        };
        write!(f, "{name}")
    }
}

impl RoomTransition {
    /// Whether the room keeps an assigned agent after this transition.
    pub fn assigns_agent(&self) -> bool {
        matches!(self, RoomTransition::Claim)
    }
}

impl RoomStatus {
    pub fn apply(self, transition: RoomTransition) -> Result<RoomStatus, TransitionError> {
        use RoomStatus::*;
        use RoomTransition::*;

        match (self, transition) {
            (Waiting, Claim) => Ok(Active),
            (Active, ReturnToQueue) => Ok(Waiting),
            (Active, Conclude) => Ok(Waiting),
            (Waiting | Active, CustomerDisconnect) => Ok(Concluded),
            (Waiting | Active, CustomerClose) => Ok(Concluded),
            (Waiting | Concluded, Reactivate) => Ok(Waiting),
            (from, attempted) => Err(TransitionError {
                from: from.to_string(),
                attempted: attempted.to_string(),
            }),
        }
    }
}

impl TicketTransition {
    /// The transition an assigned agent uses to move a ticket to `target`.
    /// Claiming is excluded: it has its own operation.
    pub fn toward(target: TicketStatus) -> Option<TicketTransition> {
        match target {
            TicketStatus::WaitingCustomer => Some(TicketTransition::AwaitCustomer),
            TicketStatus::InProgress => Some(TicketTransition::Resume),
            TicketStatus::Resolved => Some(TicketTransition::Resolve),
            TicketStatus::Closed => Some(TicketTransition::Close),
            TicketStatus::Open => None,
        }
    }
}

impl TicketStatus {
    pub fn apply(self, transition: TicketTransition) -> Result<TicketStatus, TransitionError> {
        use TicketStatus::*;
        use TicketTransition::*;

        match (self, transition) {
            (Open, Claim) => Ok(InProgress),
            (InProgress, AwaitCustomer) => Ok(WaitingCustomer),
            (WaitingCustomer, Resume) => Ok(InProgress),
            (InProgress | WaitingCustomer, Resolve) => Ok(Resolved),
            (Resolved, Close) => Ok(Closed),
            (from, attempted) => Err(TransitionError {
                from: from.to_string(),
                attempted: attempted.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROOM_STATUSES: [RoomStatus; 3] =
        [RoomStatus::Waiting, RoomStatus::Active, RoomStatus::Concluded];

    const ALL_TICKET_STATUSES: [TicketStatus; 5] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::WaitingCustomer,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    #[test]
    fn room_claim_only_from_waiting() {
        assert_eq!(
            RoomStatus::Waiting.apply(RoomTransition::Claim),
            Ok(RoomStatus::Active)
        );
        assert!(RoomStatus::Active.apply(RoomTransition::Claim).is_err());
        assert!(RoomStatus::Concluded.apply(RoomTransition::Claim).is_err());
    }

    #[test]
    fn room_agent_exits_return_room_to_waiting() {
        assert_eq!(
            RoomStatus::Active.apply(RoomTransition::ReturnToQueue),
            Ok(RoomStatus::Waiting)
        );
        assert_eq!(
            RoomStatus::Active.apply(RoomTransition::Conclude),
            Ok(RoomStatus::Waiting)
        );
        assert!(RoomStatus::Waiting.apply(RoomTransition::Conclude).is_err());
    }

    #[test]
    fn room_customer_disconnect_concludes_and_reactivate_reopens() {
        let concluded = RoomStatus::Active
            .apply(RoomTransition::CustomerDisconnect)
            .unwrap();
        assert_eq!(concluded, RoomStatus::Concluded);
        assert_eq!(
            concluded.apply(RoomTransition::Reactivate),
            Ok(RoomStatus::Waiting)
        );
        assert!(RoomStatus::Active.apply(RoomTransition::Reactivate).is_err());
    }

    #[test]
    fn only_claim_assigns_an_agent() {
        for status in ALL_ROOM_STATUSES {
            for transition in [
                RoomTransition::Claim,
                RoomTransition::ReturnToQueue,
                RoomTransition::Conclude,
                RoomTransition::CustomerDisconnect,
                RoomTransition::CustomerClose,
                RoomTransition::Reactivate,
            ] {
                if let Ok(next) = status.apply(transition) {
                    assert_eq!(next == RoomStatus::Active, transition.assigns_agent());
                }
            }
        }
    }

    #[test]
    fn ticket_moves_monotonically_to_closed() {
        let status = TicketStatus::Open.apply(TicketTransition::Claim).unwrap();
        let status = status.apply(TicketTransition::AwaitCustomer).unwrap();
        let status = status.apply(TicketTransition::Resume).unwrap();
        let status = status.apply(TicketTransition::Resolve).unwrap();
        let status = status.apply(TicketTransition::Close).unwrap();
        assert_eq!(status, TicketStatus::Closed);

        for transition in [
            TicketTransition::Claim,
            TicketTransition::AwaitCustomer,
            TicketTransition::Resume,
            TicketTransition::Resolve,
            TicketTransition::Close,
        ] {
            assert!(TicketStatus::Closed.apply(transition).is_err());
        }
        assert!(TicketStatus::Resolved
            .apply(TicketTransition::Resume)
            .is_err());
    }

    #[test]
    fn ticket_toward_reaches_requested_status_when_legal() {
        for from in ALL_TICKET_STATUSES {
            for target in ALL_TICKET_STATUSES {
                if let Some(transition) = TicketTransition::toward(target) {
                    if let Ok(next) = from.apply(transition) {
                        assert_eq!(next, target);
                    }
                }
            }
        }
        assert_eq!(TicketTransition::toward(TicketStatus::Open), None);
    }

    #[test]
    fn transition_error_names_both_sides() {
        let err = TicketStatus::Open
            .apply(TicketTransition::Close)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot close from status open");
    }
}
