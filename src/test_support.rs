use crate::{
    entry::FileEntry,
    error::StoreError,
    executor::CancelToken,
    host::{ConfirmChoice, ConfirmPrompt, ProgressUi},
    store::MediaStore,
};
use anyhow::Result;
use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    data: Vec<u8>,
}

impl MemoryFile {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }
}

impl FileEntry for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}

pub fn memory_batch(files: &[(&str, &str)]) -> Vec<Box<dyn FileEntry>> {
    files
        .iter()
        .map(|(name, data)| {
            Box::new(MemoryFile::new(name, data.as_bytes().to_vec())) as Box<dyn FileEntry>
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    None,
    Io,
    Unavailable,
    InvalidName,
    Rename,
}

#[derive(Default)]
struct StoreState {
    stored: Vec<(String, Vec<u8>)>,
    script: VecDeque<WriteFault>,
    cancel_after: Option<(usize, CancelToken)>,
    delay: Option<Duration>,
}

/// Store fake with scripted write faults.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            for (name, data) in files {
                state
                    .stored
                    .push((name.to_string(), data.as_bytes().to_vec()));
            }
        }
        store
    }

    /// Faults consumed one per write attempt, in order.
    pub fn script(&self, faults: Vec<WriteFault>) {
        self.state.lock().unwrap().script = faults.into();
    }

    pub fn cancel_after(&self, writes: usize, token: CancelToken) {
        self.state.lock().unwrap().cancel_after = Some((writes, token));
    }

    pub fn slow_writes(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn written_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .stored
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MediaStore for MemoryStore {
    fn files(&self) -> Result<HashMap<String, Box<dyn FileEntry>>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .stored
            .iter()
            .map(|(name, data)| {
                (
                    name.clone(),
                    Box::new(MemoryFile::new(name, data.clone())) as Box<dyn FileEntry>,
                )
            })
            .collect())
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<String, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let mut state = self.state.lock().unwrap();
        let fault = state.script.pop_front().unwrap_or(WriteFault::None);
        let stored_name = match fault {
            WriteFault::Io => {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "simulated reset",
                )))
            }
            WriteFault::Unavailable => {
                return Err(StoreError::Unavailable("simulated outage".to_string()))
            }
            WriteFault::InvalidName => return Err(StoreError::InvalidName(name.to_string())),
            WriteFault::Rename => format!("renamed-{name}"),
            WriteFault::None => name.to_string(),
        };
        state.stored.push((stored_name.clone(), data.to_vec()));
        let written = state.stored.len();
        if let Some((limit, token)) = &state.cancel_after {
            if written >= *limit {
                token.cancel();
            }
        }
        Ok(stored_name)
    }
}

/// Records every UI call; optionally asks to cancel once `cancel_at`
/// progress updates have been seen.
#[derive(Clone, Default)]
pub struct RecordingUi {
    pub events: Arc<Mutex<Vec<String>>>,
    pub cancel_at: Option<usize>,
    updates: Arc<AtomicUsize>,
}

impl RecordingUi {
    pub fn cancelling_after(updates: usize) -> Self {
        Self {
            cancel_at: Some(updates),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressUi for RecordingUi {
    fn start(&mut self, label: &str) {
        self.events.lock().unwrap().push(format!("start {label}"));
    }

    fn update(&mut self, _label: &str, value: usize, max: usize) {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(format!("update {value}/{max}"));
    }

    fn finish(&mut self) {
        self.events.lock().unwrap().push("finish".to_string());
    }

    fn want_cancel(&self) -> bool {
        self.cancel_at
            .map(|limit| self.updates.load(Ordering::SeqCst) >= limit)
            .unwrap_or(false)
    }
}

/// Answers with a fixed choice and remembers the questions.
#[derive(Clone)]
pub struct ScriptedConfirm {
    pub choice: ConfirmChoice,
    pub asked: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConfirm {
    pub fn new(choice: ConfirmChoice) -> Self {
        Self {
            choice,
            asked: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ConfirmPrompt for ScriptedConfirm {
    fn ask(&mut self, message: &str) -> Result<ConfirmChoice> {
        self.asked.lock().unwrap().push(message.to_string());
        Ok(self.choice)
    }
}
