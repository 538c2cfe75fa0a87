use crate::{
    config::{log_path, AppConfig},
    coordinator::{import_media, ImportContext},
    entry::LocalRoot,
    host::{ConfirmChoice, ConfirmPrompt, ProgressUi, ThreadScheduler},
    store::LocalStore,
};
use anyhow::{bail, Context, Result};
use std::{
    cell::Cell,
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::{
        mpsc::{self, Receiver},
        Arc, Mutex,
    },
    thread,
    time::Instant,
};

const PROGRESS_TICK_MS: u128 = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub source: PathBuf,
    pub store: Option<PathBuf>,
    pub flat: bool,
    pub assume_yes: bool,
    pub no_log_file: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Import(ImportOptions),
    Help,
    Version,
}

/// Returns whether the import succeeded.
pub fn run() -> Result<bool> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args)? {
        CliAction::Help => {
            print_help();
            Ok(true)
        }
        CliAction::Version => {
            println!("media-import v{}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
        CliAction::Import(options) => run_import(options),
    }
}

pub fn parse_args(args: &[String]) -> Result<CliAction> {
    let mut source = None;
    let mut store = None;
    let mut flat = false;
    let mut assume_yes = false;
    let mut no_log_file = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" => return Ok(CliAction::Help),
            "--version" | "-V" | "version" => return Ok(CliAction::Version),
            "--store" | "-s" => {
                let Some(path) = iter.next() else {
                    bail!("--store requires a path");
                };
                store = Some(PathBuf::from(path));
            }
            "--flat" => flat = true,
            "--yes" | "-y" => assume_yes = true,
            "--no-log-file" => no_log_file = true,
            value if value.starts_with('-') => bail!("unknown option {value}"),
            value => {
                if source.is_some() {
                    bail!("only one source folder can be imported at a time");
                }
                source = Some(PathBuf::from(value));
            }
        }
    }

    let Some(source) = source else {
        return Ok(CliAction::Help);
    };
    Ok(CliAction::Import(ImportOptions {
        source,
        store,
        flat,
        assume_yes,
        no_log_file,
    }))
}

fn print_help() {
    println!("media-import");
    println!("  media-import [options] <folder>   Import media files from a folder");
    println!();
    println!("Options:");
    println!("  -s, --store <dir>   Media store folder (default from config)");
    println!("      --flat          Only import files directly inside <folder>");
    println!("  -y, --yes           Skip conflicting files without asking");
    println!("      --no-log-file   Do not append to the import log file");
    println!("  -h, --help          Show this help");
    println!("  -V, --version       Show version");
    println!();
    println!("Type q and Enter while files are being added to cancel.");
}

fn run_import(options: ImportOptions) -> Result<bool> {
    let config = AppConfig::load_or_create()?;
    let store_dir = match options.store {
        Some(dir) => dir,
        None => config.store_dir()?,
    };
    let log_file = if config.write_log_file && !options.no_log_file {
        Some(log_path()?)
    } else {
        None
    };
    let input = StdinLines::spawn().context("watch stdin")?;
    let confirm: Box<dyn ConfirmPrompt> = if options.assume_yes {
        Box::new(AutoConfirm(ConfirmChoice::Continue))
    } else {
        Box::new(TerminalConfirm {
            input: input.clone(),
        })
    };

    let mut ctx = ImportContext {
        store: Arc::new(LocalStore::new(&store_dir)),
        ui: Box::new(TerminalProgress::new(input)),
        confirm,
        scheduler: Box::new(ThreadScheduler),
        settings: config.import_settings(),
        log_path: log_file,
    };
    let source = LocalRoot::new(&options.source, config.recursive && !options.flat);

    let mut success = false;
    import_media(&mut ctx, &source, |result| {
        for line in &result.logs {
            println!("{line}");
        }
        success = result.success;
    });
    Ok(success)
}

/// Lines typed on stdin, read by one watcher thread and shared by the
/// progress display and the confirmation prompt.
#[derive(Clone)]
pub struct StdinLines {
    rx: Arc<Mutex<Receiver<String>>>,
}

impl StdinLines {
    pub fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin-watcher".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .context("spawn stdin watcher")?;
        Ok(Self::from_receiver(rx))
    }

    pub fn from_receiver(rx: Receiver<String>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    fn try_line(&self) -> Option<String> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    fn next_line(&self) -> Option<String> {
        self.rx.lock().ok()?.recv().ok()
    }
}

pub struct TerminalProgress {
    input: StdinLines,
    cancelled: Cell<bool>,
    last_value: Option<usize>,
    last_tick: Instant,
}

impl TerminalProgress {
    pub fn new(input: StdinLines) -> Self {
        Self {
            input,
            cancelled: Cell::new(false),
            last_value: None,
            last_tick: Instant::now(),
        }
    }
}

impl ProgressUi for TerminalProgress {
    fn start(&mut self, label: &str) {
        self.last_value = None;
        println!("{label}...");
    }

    fn update(&mut self, label: &str, value: usize, _max: usize) {
        let changed = self.last_value != Some(value);
        let should_tick = self.last_tick.elapsed().as_millis() >= PROGRESS_TICK_MS;
        if changed || should_tick {
            println!("  {}", label.replace('\n', " | "));
            self.last_value = Some(value);
            self.last_tick = Instant::now();
        }
    }

    fn finish(&mut self) {
        io::stdout().flush().ok();
    }

    fn want_cancel(&self) -> bool {
        while let Some(line) = self.input.try_line() {
            if is_cancel_command(&line) {
                self.cancelled.set(true);
            }
        }
        self.cancelled.get()
    }
}

fn is_cancel_command(line: &str) -> bool {
    matches!(
        line.trim().to_lowercase().as_str(),
        "q" | "quit" | "cancel"
    )
}

pub struct TerminalConfirm {
    input: StdinLines,
}

impl ConfirmPrompt for TerminalConfirm {
    fn ask(&mut self, message: &str) -> Result<ConfirmChoice> {
        println!();
        println!("{message}");
        print!(
            "Choose [a] {}, [c] {} (Enter = abort): ",
            ConfirmChoice::Abort.label(),
            ConfirmChoice::Continue.label()
        );
        io::stdout().flush().ok();
        let Some(input) = self.input.next_line() else {
            return Ok(ConfirmChoice::Abort);
        };
        Ok(parse_choice(&input))
    }
}

fn parse_choice(input: &str) -> ConfirmChoice {
    match input.trim().to_lowercase().as_str() {
        "c" | "continue" | "y" | "yes" => ConfirmChoice::Continue,
        _ => ConfirmChoice::Abort,
    }
}

/// Answers every question the same way.
pub struct AutoConfirm(pub ConfirmChoice);

impl ConfirmPrompt for AutoConfirm {
    fn ask(&mut self, message: &str) -> Result<ConfirmChoice> {
        tracing::warn!("{message} -> {}", self.0.label());
        Ok(self.0)
    }
}
