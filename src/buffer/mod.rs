// ABOUTME: Per-file edit buffers with debounced persistence

/// Tab list and persist scheduling.
pub mod manager;
/// A single open buffer.
pub mod open_file;
/// Debounce timers.
pub mod timer;

pub use manager::{EditBufferManager, PersistOutcome};
pub use open_file::{BufferStatus, OpenFile};
pub use timer::{PersistDue, PersistTimer};
