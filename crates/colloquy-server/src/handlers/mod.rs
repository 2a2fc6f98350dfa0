//! Request handlers, grouped by resource.

pub mod runs;
pub mod sessions;
