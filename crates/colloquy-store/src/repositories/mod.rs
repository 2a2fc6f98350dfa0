//! Stateless repositories over raw `SQLite` rows.
//!
//! Every method takes `&Connection`; transaction scope is chosen by the
//! caller (the [`crate::store::SessionStore`] facade).

pub mod event;
pub mod session;

pub use event::EventRepo;
pub use session::SessionRepo;
