mod event;
pub mod memory;
mod nitrite_map;
mod nitrite_store;

pub use event::*;
pub use nitrite_map::*;
pub use nitrite_store::*;
