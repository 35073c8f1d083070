//! Client side of the support desk realtime core.
//!
//! - `transport`: one push stream per user, reconnecting with capped
//!   exponential backoff
//! - `dispatcher`: fans decoded events out to listeners by category
//! - `store`: rooms, tickets and messages kept in sync from events, REST
//!   fetches and optimistic commands
//! - `staleness`: re-fetches lists when a connected stream has gone quiet
//! - `api`: the REST endpoints the store calls

pub mod api;
pub mod dispatcher;
pub mod staleness;
pub mod store;
pub mod transport;

pub use dispatcher::{DispatchError, Dispatcher, Subscription};
pub use store::{ActionResult, SupportStore};
pub use transport::{ConnectionState, Transport};
