//! Read queries over the loaded tables.
//!
//! Each query struct borrows a [`Connection`](crate::connection::Connection)
//! and returns typed rows.

pub mod cards;

pub use cards::{CardQuery, ListCardsParams};
