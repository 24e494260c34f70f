//! State store adapters for the AG-UI run coordinator.

pub mod file_store;
pub mod memory_store;

pub use file_store::FileStateStore;
pub use memory_store::MemoryStateStore;
