//! SQLite backend for the Acquaint contact store, plus a filesystem image
//! store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod images;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use images::FsImageStore;
pub use store::SqliteStore;
