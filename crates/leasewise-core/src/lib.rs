//! Core types, the renewal state machine, and repository traits for
//! Leasewise.
//!
//! This crate is free of HTTP and database dependencies. Everything in
//! [`stage`], [`classify`] and [`score`] is pure; [`record`] applies those
//! rules to a record and keeps its audit trail.

// Native `async fn`-style trait methods; the returned futures are `Send`.
#![allow(async_fn_in_trait)]

pub mod ack;
pub mod alert;
pub mod classify;
pub mod error;
pub mod fixture;
pub mod notify;
pub mod record;
pub mod score;
pub mod scorecard;
pub mod stage;
pub mod store;
pub mod view;

pub use error::{Error, Result};
