//! Server-Sent Events (SSE) infrastructure for real-time support updates.
//!
//! This crate pushes chat, ticket, order and system events from the backend
//! to connected customers and staff.
//!
//! # Architecture
//!
//! - **Single connection per user**: each user holds at most one live stream.
//!   Opening a new one replaces (and closes) the old one.
//! - **Audience resolution**: the server decides who receives an event from
//!   the event itself ([`router::audience_for`]); clients never choose.
//! - **Ephemeral messages**: if a user is offline, they miss the event and
//!   re-fetch lists when they reconnect.
//! - **One serialization per event**: the payload is encoded once and the same
//!   frame is fanned out; a user appears at most once per fan-out.
//!
//! # Message Flow
//!
//! 1. Client opens `/api/sse/{user_id}`; the handler writes the `connected`
//!    handshake frame and registers the stream with the user's role.
//! 2. A domain mutator commits a change and publishes a `DomainEvent`.
//! 3. [`SseDomainEventHandler`] turns it into a `PushEvent` and hands it to
//!    [`Manager::route`].
//! 4. The manager resolves the audience and writes to each recipient's stream.
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry keyed by user id, with type-safe ConnectionId
//! - `router`: event → audience rules
//! - `manager`: resolves audiences against live connections and fans out
//! - `message`: scope definitions and frame encoding
//! - `domain_event_handler`: bridge from domain events to push events

pub mod connection;
pub mod domain_event_handler;
pub mod manager;
pub mod message;
pub mod router;

pub use domain_event_handler::SseDomainEventHandler;
pub use manager::Manager;
