//! Contains the building blocks the session is assembled from.
//!
//! The `ScheduledTimer` drives phase expiry and the `Dispatcher` delivers
//! transitions to observers. The `Session` owns one of each.

pub mod dispatcher;
pub mod timer;
