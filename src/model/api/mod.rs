//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Password hashes never appear.

pub mod admin;
pub mod auth;
pub mod candidate;
pub mod dashboard;
pub mod dump;
pub mod election;
pub mod id;
pub mod pagination;
pub mod tally;
pub mod vote;
pub mod voter;
