use crate::{
    entry::{FileEntry, MediaSource},
    error::ImportError,
    executor::{
        CancelToken, ExecutorOutcome, ImportExecutor, ImportMessage, MAX_CONSECUTIVE_ERRORS,
    },
    host::{ConfirmChoice, ConfirmPrompt, ProgressUi, TaskScheduler},
    log::{ImportLog, LogEntry, LogLevel},
    resolver,
    store::MediaStore,
};
use anyhow::{anyhow, bail, Context, Result};
use std::{
    any::Any,
    backtrace::Backtrace,
    cell::RefCell,
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc, Once,
    },
    time::Duration,
};

const IMPORT_LABEL: &str = "Importing media";
const CONFLICT_RULE: &str = "----------------";

static TRACE_HOOK: Once = Once::new();

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = RefCell::new(None);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub logs: Vec<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ImportSettings {
    pub max_consecutive_errors: usize,
    pub poll_interval: Duration,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_consecutive_errors: MAX_CONSECUTIVE_ERRORS,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Everything an import talks to, handed in by the host.
pub struct ImportContext {
    pub store: Arc<dyn MediaStore>,
    pub ui: Box<dyn ProgressUi>,
    pub confirm: Box<dyn ConfirmPrompt>,
    pub scheduler: Box<dyn TaskScheduler>,
    pub settings: ImportSettings,
    pub log_path: Option<PathBuf>,
}

/// Imports every file of `source` into the context's store. `on_done`
/// is called exactly once, whatever happens.
pub fn import_media(
    ctx: &mut ImportContext,
    source: &dyn MediaSource,
    on_done: impl FnOnce(ImportResult),
) {
    install_trace_hook();
    let mut log = ImportLog::new(ctx.log_path.clone());
    ctx.ui.start(IMPORT_LABEL);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_import(ctx, source, &mut log)));
    let success = match outcome {
        Ok(Ok(success)) => success,
        Ok(Err(err)) => {
            log.error(format!("{err:?}"));
            log.error(err.to_string());
            false
        }
        Err(payload) => {
            let message = format!("import panicked: {}", panic_message(payload.as_ref()));
            if let Some(trace) = take_panic_trace() {
                log.error(format!("{message}\n\n{trace}"));
            }
            log.error(message);
            false
        }
    };

    ctx.ui.finish();
    on_done(ImportResult {
        logs: log.into_lines(),
        success,
    });
}

fn run_import(
    ctx: &mut ImportContext,
    source: &dyn MediaSource,
    log: &mut ImportLog,
) -> Result<bool> {
    let mut files = source.files().context("list media files")?;
    log.info(format!("{} media files found.", files.len()));

    let unnormalized = resolver::find_unnormalized_names(&files);
    if !unnormalized.is_empty() {
        log.error(ImportError::UnnormalizedNames(unnormalized).to_string());
        return Ok(false);
    }

    let identical = match resolver::dedupe_batch(&mut files) {
        Ok(identical) => identical,
        Err(err @ ImportError::AmbiguousName(_)) => {
            log.error(err.to_string());
            return Ok(false);
        }
        Err(err) => return Err(err.into()),
    };
    if identical > 0 {
        log.info(format!(
            "{identical} files were skipped because they are identical."
        ));
    }

    let existing = ctx.store.files().context("list existing media")?;
    let collisions = resolver::partition_store_collisions(&mut files, &existing)?;
    if !collisions.conflicts.is_empty() {
        let count = collisions.conflicts.len();
        let message = format!("{count} files have the same name as existing media files:");
        log.warn(message.clone());
        let mut names = collisions.conflict_names().join("\n");
        names.push('\n');
        names.push_str(CONFLICT_RULE);
        log.warn(names);

        ctx.ui.finish();
        let choice = ctx
            .confirm
            .ask(&format!("{message}\nDo you want to import the rest of the files?"));
        ctx.ui.start(IMPORT_LABEL);
        if choice? == ConfirmChoice::Abort {
            log.error("Aborted import due to name conflict with existing media");
            return Ok(false);
        }
        log.warn(format!(
            "{count} files were skipped because their names conflict with existing media."
        ));
    }
    if collisions.identical > 0 {
        log.info(format!(
            "{} files were skipped because they already exist in collection.",
            collisions.identical
        ));
    }

    if files.is_empty() {
        log.info("0 media files were imported.");
        return Ok(true);
    }

    log.info(format!("{} media files will be processed.", files.len()));
    let outcome = run_in_background(ctx, files.into(), log)?;
    let level = if outcome.success() {
        LogLevel::Info
    } else {
        LogLevel::Warn
    };
    log.push(LogEntry::new(level, outcome.message()));
    Ok(outcome.success())
}

/// Hands the batch to a worker and pumps its messages until it reports.
fn run_in_background(
    ctx: &mut ImportContext,
    batch: VecDeque<Box<dyn FileEntry>>,
    log: &mut ImportLog,
) -> Result<ExecutorOutcome> {
    let (tx, rx) = mpsc::channel();
    let cancel = CancelToken::default();
    let executor = ImportExecutor::new(batch, Arc::clone(&ctx.store), cancel.clone(), tx.clone())
        .with_max_consecutive_errors(ctx.settings.max_consecutive_errors);

    ctx.scheduler.spawn(Box::new(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(move || executor.run()));
        let finished = match result {
            Ok(result) => result.map_err(anyhow::Error::from),
            Err(payload) => {
                let message = format!(
                    "import worker panicked: {}",
                    panic_message(payload.as_ref())
                );
                Err(match take_panic_trace() {
                    Some(trace) => anyhow!(trace).context(message),
                    None => anyhow!(message),
                })
            }
        };
        let _ = tx.send(ImportMessage::Finished(finished));
    }))?;

    loop {
        if ctx.ui.want_cancel() && !cancel.is_cancelled() {
            tracing::info!("cancel requested, stopping after the current file");
            cancel.cancel();
        }
        match rx.recv_timeout(ctx.settings.poll_interval) {
            Ok(ImportMessage::Progress(progress)) => {
                ctx.ui.update(&progress.label, progress.value, progress.max);
            }
            Ok(ImportMessage::Log(entry)) => log.push(entry),
            Ok(ImportMessage::Finished(result)) => return result,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                bail!("import worker stopped without reporting a result")
            }
        }
    }
}

/// Keeps the backtrace of the latest panic on each thread so a caught
/// panic can be logged with it. The previous hook still runs.
fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
