//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//!
//! Each record comes in two flavours: a `*Core` holding the data, aliased as
//! `New*` for insertion, and a wrapper pairing it with its unique ID.

pub mod admin;
pub mod audit;
pub mod candidate;
pub mod election;
pub mod vote;
pub mod voter;
