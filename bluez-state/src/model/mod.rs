//! Model types for bluez-state

mod entry;
mod handle;

pub use entry::{Entry, EntryState};
pub use handle::{Handle, Resolvable};
