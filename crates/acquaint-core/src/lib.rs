//! Core types and trait definitions for Acquaint.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the domain model, the collaborator traits (contact store, image store,
//! analyzer) and every piece of policy that sits between them: payload
//! normalisation, contact resolution, the repair job and the ingest pipeline.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod changes;
pub mod contact;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod payload;
pub mod repair;
pub mod store;
pub mod upsert;

pub use error::{Error, Result};
