pub mod cli;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod executor;
pub mod host;
pub mod log;
pub mod progress;
pub mod resolver;
pub mod store;

#[cfg(test)]
mod test_support;

pub use coordinator::{import_media, ImportContext, ImportResult, ImportSettings};
pub use entry::{FileEntry, LocalFile, LocalRoot, MediaSource};
pub use error::{ImportError, StoreError};
pub use host::{ConfirmChoice, ConfirmPrompt, ProgressUi, TaskScheduler};
pub use store::{LocalStore, MediaStore};
