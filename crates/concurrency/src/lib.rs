//! Session-scoped transaction coordination for the document command layer.
//!
//! [`session::SessionPool`] is the engine's transaction table: one snapshot
//! per open session, merged back into the base store on commit via
//! [`tracked_store::TrackedStore`]'s namespace tracking (§4.5).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod session;
pub mod tracked_store;

pub use session::{SessionKey, SessionPool, DEFAULT_TRANSACTION_TIMEOUT};
pub use tracked_store::TrackedStore;
