mod date_utils;
mod index_utils;
mod type_utils;

pub use date_utils::*;
pub(crate) use index_utils::*;
pub use type_utils::*;
