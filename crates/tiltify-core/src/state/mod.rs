// # State Store Implementations
//
// This module provides implementations of the StateStore trait for
// different persistence strategies.

mod document;
pub mod file;
pub mod memory;

pub use file::{FileStateStore, FileStateStoreFactory};
pub use memory::{MemoryStateStore, MemoryStateStoreFactory};
