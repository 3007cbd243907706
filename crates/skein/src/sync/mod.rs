//! Local/remote change synchronization.
//!
//! - [`change`]: change and conflict records, the pending ledger
//! - [`resolver`]: conflict strategies
//! - [`manager`]: [`SyncManager`], tying ledger, watcher, and sync passes together
//!
//! The watcher and its debounce loop are internal to the manager.

pub mod change;
pub mod events;
pub mod manager;
pub mod resolver;
mod scheduler;
mod watcher;

pub use change::{ChangeLog, ChangeRecord, ChangeSource, ChangeType, ConflictRecord};
pub use events::SyncEvent;
pub use manager::{ChangeSink, SyncManager, SyncReport, SyncState, WatchStatus};
pub use resolver::{resolve, ConflictStrategy, Resolution, Winner};
