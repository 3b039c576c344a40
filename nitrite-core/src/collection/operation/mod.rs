mod collection_operations;
mod index_manager;
mod index_operations;
mod index_writer;
mod read_operations;
mod write_operations;
mod write_result;

pub(crate) use collection_operations::*;
pub(crate) use write_operations::{ChangeSet, WriteOperations};
pub use write_result::*;
