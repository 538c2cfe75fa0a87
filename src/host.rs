//! Interfaces the embedding program provides to an import.

use anyhow::{Context, Result};
use std::thread;

/// Visible progress of the running operation.
pub trait ProgressUi {
    fn start(&mut self, label: &str);

    fn update(&mut self, label: &str, value: usize, max: usize);

    fn finish(&mut self);

    /// Polled by the foreground while the background work runs.
    fn want_cancel(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    Abort,
    Continue,
}

impl ConfirmChoice {
    pub fn label(self) -> &'static str {
        match self {
            ConfirmChoice::Abort => "Abort Import",
            ConfirmChoice::Continue => "Continue Import",
        }
    }
}

/// Two-button question shown to the user.
pub trait ConfirmPrompt {
    fn ask(&mut self, message: &str) -> Result<ConfirmChoice>;
}

pub type BackgroundJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs a unit of work off the calling thread.
pub trait TaskScheduler {
    fn spawn(&self, job: BackgroundJob) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl TaskScheduler for ThreadScheduler {
    fn spawn(&self, job: BackgroundJob) -> Result<()> {
        thread::Builder::new()
            .name("media-import-worker".to_string())
            .spawn(job)
            .context("spawn import worker")?;
        Ok(())
    }
}

/// Runs the job to completion on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl TaskScheduler for InlineScheduler {
    fn spawn(&self, job: BackgroundJob) -> Result<()> {
        job();
        Ok(())
    }
}
