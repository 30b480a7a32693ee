//! Election rules, independent of HTTP and of any particular store.
//!
//! [`window`] classifies elections in time, [`admission`] decides whether a
//! vote may be recorded, and [`tally`] turns recorded votes into results.
//! [`manage`] holds the administrative operations that keep the data those
//! three rely on well formed.

pub mod admission;
pub mod audit;
pub mod manage;
pub mod tally;
pub mod window;

pub use admission::{admit_vote, AdmissionError};
pub use tally::{compute_tally, dump, recount, tally, RecountError, TallyError};
pub use window::classify;
