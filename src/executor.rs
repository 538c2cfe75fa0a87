use crate::{
    entry::FileEntry,
    error::{ImportError, StoreError},
    log::{LogEntry, LogLevel},
    progress::ProgressTracker,
    store::MediaStore,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Arc,
    },
};

pub const MAX_CONSECUTIVE_ERRORS: usize = 5;
const UNPROCESSED_NAME_LIMIT: usize = 10;
const ERROR_RULE: &str = "----------------";

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportProgress {
    pub label: String,
    pub value: usize,
    pub max: usize,
}

/// Worker to foreground traffic. Display only; carries no control.
#[derive(Debug)]
pub enum ImportMessage {
    Progress(ImportProgress),
    Log(LogEntry),
    Finished(anyhow::Result<ExecutorOutcome>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorOutcome {
    Completed { total: usize },
    Cancelled { processed: usize, total: usize },
    TooManyErrors { processed: usize, total: usize },
}

impl ExecutorOutcome {
    pub fn success(self) -> bool {
        matches!(self, ExecutorOutcome::Completed { .. })
    }

    pub fn message(self) -> String {
        match self {
            ExecutorOutcome::Completed { total } => {
                format!("{total} media files were imported.")
            }
            ExecutorOutcome::Cancelled { processed, total } => {
                format!("Import aborted. {processed}/{total} media files were imported.")
            }
            ExecutorOutcome::TooManyErrors { processed, total } => {
                format!("{processed}/{total} media files were imported.")
            }
        }
    }
}

/// Writes the batch one file at a time, head first. A file whose write
/// fails recoverably goes to the back of the queue.
pub struct ImportExecutor {
    batch: VecDeque<Box<dyn FileEntry>>,
    tracker: ProgressTracker,
    store: Arc<dyn MediaStore>,
    cancel: CancelToken,
    tx: Sender<ImportMessage>,
    max_consecutive_errors: usize,
}

impl ImportExecutor {
    pub fn new(
        batch: VecDeque<Box<dyn FileEntry>>,
        store: Arc<dyn MediaStore>,
        cancel: CancelToken,
        tx: Sender<ImportMessage>,
    ) -> Self {
        let tracker = ProgressTracker::snapshot(&batch);
        Self {
            batch,
            tracker,
            store,
            cancel,
            tx,
            max_consecutive_errors: MAX_CONSECUTIVE_ERRORS,
        }
    }

    pub fn with_max_consecutive_errors(mut self, max: usize) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    pub fn run(mut self) -> Result<ExecutorOutcome, ImportError> {
        let total = self.tracker.total_count();
        let mut error_count = 0usize;

        loop {
            if self.batch.is_empty() {
                return Ok(ExecutorOutcome::Completed { total });
            }
            if self.cancel.is_cancelled() {
                return Ok(ExecutorOutcome::Cancelled {
                    processed: self.tracker.processed_count(),
                    total,
                });
            }

            self.publish_progress();
            let Some(file) = self.batch.pop_front() else {
                continue;
            };
            self.tracker.on_file_dequeued(file.size());

            match write_file(self.store.as_ref(), file.as_ref()) {
                Ok(()) => error_count = 0,
                Err(ImportError::Write { name, source }) if source.is_recoverable() => {
                    error_count += 1;
                    self.tracker.on_file_requeued(file.size());
                    self.log(
                        LogLevel::Error,
                        format!("{ERROR_RULE}\n{name}: {source}\n{ERROR_RULE}"),
                    );
                    if error_count > self.max_consecutive_errors {
                        self.log_unprocessed(file.as_ref());
                        return Ok(ExecutorOutcome::TooManyErrors {
                            processed: self.tracker.processed_count(),
                            total,
                        });
                    }
                    self.batch.push_back(file);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn publish_progress(&self) {
        let _ = self.tx.send(ImportMessage::Progress(ImportProgress {
            label: self.tracker.progress_label(),
            value: self.tracker.processed_count(),
            max: self.tracker.total_count(),
        }));
    }

    fn log(&self, level: LogLevel, message: String) {
        let _ = self.tx.send(ImportMessage::Log(LogEntry::new(level, message)));
    }

    fn log_unprocessed(&self, failed: &dyn FileEntry) {
        let left = self.tracker.remaining_count();
        self.log(LogLevel::Error, format!("{left} files were not imported."));
        let names = std::iter::once(failed.name())
            .chain(self.batch.iter().map(|file| file.name()))
            .take(UNPROCESSED_NAME_LIMIT);
        for name in names {
            self.log(LogLevel::Error, name.to_string());
        }
        if left > UNPROCESSED_NAME_LIMIT {
            self.log(
                LogLevel::Error,
                format!("... and {} more", left - UNPROCESSED_NAME_LIMIT),
            );
        }
    }
}

/// Copies one entry into the store under its own name.
fn write_file(store: &dyn MediaStore, file: &dyn FileEntry) -> Result<(), ImportError> {
    let name = file.name();
    let data = file.read_bytes().map_err(|err| ImportError::Write {
        name: name.to_string(),
        source: StoreError::Io(err),
    })?;
    let stored = store.write(name, &data).map_err(|source| ImportError::Write {
        name: name.to_string(),
        source,
    })?;
    if stored != name {
        return Err(ImportError::Integrity {
            requested: name.to_string(),
            stored,
        });
    }
    Ok(())
}
