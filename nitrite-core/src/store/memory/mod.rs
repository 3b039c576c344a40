mod map;
mod store;

pub use map::InMemoryMap;
pub use store::InMemoryStore;
