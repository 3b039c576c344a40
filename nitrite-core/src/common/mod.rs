mod constants;
mod convertible;
mod event_bus;
mod executor;
mod fields;
mod lock;
mod meta;
mod processor;
pub(crate) mod util;
mod value;

pub use constants::*;
pub use convertible::*;
pub use event_bus::*;
pub use executor::*;
pub use fields::*;
pub use lock::*;
pub use meta::*;
pub use processor::*;
pub use util::{atomic, get_current_time_or_zero, Atomic, ReadExecutor, WriteExecutor};
pub use value::*;
