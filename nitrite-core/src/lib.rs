#![allow(clippy::new_without_default, clippy::type_complexity)]
//! # Nitrite Core - Embedded Document Store Engine
//!
//! The storage core of an embedded, schemaless document database. Documents
//! live in named collections on top of an ordered key-value store; secondary
//! indexes are kept consistent with every write; transactions give atomic
//! multi-operation commits; and changes are reported asynchronously to
//! subscribed listeners.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nitrite_core::doc;
//! use nitrite_core::collection::Filter;
//! use nitrite_core::index::IndexKind;
//! use nitrite_core::nitrite::Nitrite;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Nitrite::builder().open_or_create()?;
//! let users = db.collection("users")?;
//!
//! users.create_index(vec!["email"], IndexKind::Unique)?;
//! users.insert(doc! { name: "Alice", email: "alice@example.org" })?;
//!
//! let found = users.find(Filter::eq("email", "alice@example.org"))?;
//! assert_eq!(found.size(), 1);
//!
//! let txn = users.begin_transaction()?;
//! txn.insert(doc! { name: "Bob", email: "bob@example.org" })?;
//! txn.commit()?;
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - Documents, ids, filters, collections and their events
//! - [`common`] - Values, fields, locks, the event bus, executors and processors
//! - [`errors`] - Error types and result definitions
//! - [`index`] - Index descriptors and the unique, non-unique and full-text indexes
//! - [`nitrite`] - The database handle
//! - [`nitrite_builder`] - Database builder
//! - [`nitrite_config`] - Database configuration
//! - [`store`] - The ordered-map store contract and the in-memory backend
//! - [`transaction`] - Single-collection transactions

use crate::collection::snowflake::SnowflakeIdGenerator;
use crate::common::{atomic, Atomic, DEFAULT_FIELD_SEPARATOR};
use std::sync::LazyLock;
use std::thread::available_parallelism;

pub mod collection;
pub mod common;
pub mod errors;
pub mod index;
pub mod nitrite;
pub mod nitrite_builder;
pub mod nitrite_config;
pub mod store;
pub mod transaction;

pub use collection::{Document, Filter, NitriteCollection, NitriteId};
pub use common::Value;
pub use errors::{ErrorKind, NitriteError, NitriteResult};
pub use nitrite::Nitrite;

pub(crate) static FIELD_SEPARATOR: LazyLock<Atomic<String>> =
    LazyLock::new(|| atomic(DEFAULT_FIELD_SEPARATOR.to_string()));
pub(crate) static ID_GENERATOR: LazyLock<SnowflakeIdGenerator> =
    LazyLock::new(SnowflakeIdGenerator::new);

/// Returns the number of available CPU cores, or 1 when it cannot be detected.
///
/// ```rust
/// let cpu_count = nitrite_core::get_cpu_count();
/// assert!(cpu_count > 0);
/// ```
pub fn get_cpu_count() -> usize {
    available_parallelism()
        .map(|p| p.get())
        .unwrap_or_else(|err| {
            log::warn!("Failed to detect available parallelism: {}. Defaulting to single thread.", err);
            1
        })
}
