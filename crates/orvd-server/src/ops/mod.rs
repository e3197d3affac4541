//! Relay operations, independent of the transport that invoked them.
//!
//! Every operation returns an [`Answer`](crate::dispatch::Answer); absence is the
//! `$-1` sentinel, not an error. Errors are reserved for store failures and
//! disabled endpoints.

pub mod admin;
pub mod logs;
pub mod mission_sender;
pub mod vehicle;

#[cfg(test)]
mod tests;
