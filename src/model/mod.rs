//! Data types, split by who consumes them.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
