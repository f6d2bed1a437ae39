//! The read-eval-print loop.
//!
//! Reads lines with rustyline (history, line editing), tokenizes them,
//! and dispatches to the [`Session`]. Command failures print and the
//! loop continues; only `exit`, Ctrl+D, or a broken terminal end it.
//!
//! Two failures are interactive rather than terminal: opening a missing
//! database offers to create it, and a database whose files cannot be
//! read offers to remove the affected index/record pair. Both prompts
//! come through the same line editor as everything else.
//!
//! History persists to `~/.bibdex_history`; the `BIBDEX_HISTORY`
//! environment variable overrides the location, and an empty value
//! disables persistence.

use std::env;
use std::path::PathBuf;

use eyre::{Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::cli::commands::{tokenize, Session};
use crate::error::DbError;

const PROMPT: &str = "bibdex> ";
const HISTORY_ENV_VAR: &str = "BIBDEX_HISTORY";
const DEFAULT_HISTORY_FILE: &str = ".bibdex_history";

pub struct Repl {
    session: Session,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(base: PathBuf) -> Result<Self> {
        let mut editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;
        if let Some(history) = history_path() {
            let _ = editor.load_history(&history);
        }
        Ok(Self {
            session: Session::new(base),
            editor,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        println!("bibdex {}", env!("CARGO_PKG_VERSION"));
        println!("Type 'help' for the command list.");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.editor.add_history_entry(trimmed).ok();
                    if !self.dispatch(trimmed) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => println!("^C"),
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error reading input: {}", err);
                    break;
                }
            }
        }

        if self.session.is_open() {
            println!("{}", self.session.close());
        }
        println!("So long...");
        self.save_history();
        Ok(())
    }

    /// Returns `false` when the loop should end.
    fn dispatch(&mut self, line: &str) -> bool {
        let words = tokenize(line);
        let (command, args) = words.split_first().expect("non-empty line");

        let outcome = match command.as_str() {
            "exit" | "quit" => return false,
            "help" => Ok(self.session.help()),
            "close" => Ok(self.session.close()),
            "create" => self.session.create(args),
            "open" => return self.open_with_recovery(args),
            "read" => self.session.read(args),
            "find" => self.session.find(args),
            "search" => self.session.search(args),
            "top" => self.session.top(args),
            "select" => self.session.select(args),
            "whoami" => self.session.whoami(),
            unknown => {
                println!("Command not found: {}", unknown);
                return true;
            }
        };

        match outcome {
            Ok(output) if output.is_empty() => {}
            Ok(output) => println!("{}", output),
            Err(report) => self.report(&report),
        }
        true
    }

    /// `open` with the interactive recovery flows.
    fn open_with_recovery(&mut self, args: &[String]) -> bool {
        let report = match self.session.open(args) {
            Ok(output) => {
                println!("{}", output);
                return true;
            }
            Err(report) => report,
        };

        match report.downcast_ref::<DbError>() {
            Some(DbError::NotExist(_)) => {
                println!("{}", report);
                if self.confirm("Create it now? (y/n) ") {
                    match self.session.create(args) {
                        Ok(output) => println!("{}", output),
                        Err(report) => self.report(&report),
                    }
                }
            }
            Some(DbError::OpeningError(file)) => {
                let file = file.clone();
                println!("File corrupted: {}", file);
                if self.confirm("Remove the affected pair now? (y/n) ") {
                    match self.session.remove_pair(&args[0], &file) {
                        Ok(output) => println!("{}", output),
                        Err(report) => self.report(&report),
                    }
                }
            }
            _ => self.report(&report),
        }
        true
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        matches!(self.editor.readline(prompt), Ok(line) if line.trim() == "y")
    }

    fn report(&self, report: &eyre::Report) {
        println!("{}", report);
        if let Some(usage) = report
            .downcast_ref::<DbError>()
            .and_then(|err| err.usage())
        {
            println!("Format: {}.", usage);
        }
        if let Some(DbError::NotOpen) = report.downcast_ref::<DbError>() {
            println!("Please open a database first.");
        }
    }

    fn save_history(&mut self) {
        if let Some(history) = history_path() {
            let _ = self.editor.save_history(&history);
        }
    }
}

fn history_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var(HISTORY_ENV_VAR) {
        if custom.is_empty() {
            return None;
        }
        return Some(PathBuf::from(custom));
    }
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(DEFAULT_HISTORY_FILE))
}
