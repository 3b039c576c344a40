//! Collections and the documents they hold.
//!
//! A `Document` is an ordered map from field names to [Value](crate::common::Value)s.
//! Nested fields are addressed with paths joined by the configured separator
//! (default `"."`).
//!
//! ```rust,ignore
//! let mut doc = Document::new();
//! doc.put("name", "Alice")?;
//! doc.put("address.city", "New York")?;
//! assert_eq!(doc.get("address.city")?, Value::from("New York"));
//! ```
//!
//! A `NitriteCollection` stores documents under their [NitriteId], keeps its
//! secondary indexes consistent with every write and reports changes to
//! subscribed listeners.
//!
//! ```rust,ignore
//! let users = db.collection("users")?;
//! users.subscribe(CollectionEventListener::new(|event| {
//!     println!("{:?}", event.event_type());
//!     Ok(())
//! }))?;
//! users.insert(doc! { name: "Alice" })?;
//! ```

mod collection_factory;
mod cursor;
mod document;
mod event;
mod filter;
mod nitrite_collection;
mod nitrite_id;
pub mod operation;
pub(crate) mod snowflake;

pub(crate) use collection_factory::*;
pub use cursor::*;
pub use document::*;
pub use event::*;
pub use filter::*;
pub use nitrite_collection::*;
pub use nitrite_id::*;
pub use operation::WriteResult;
