// Common functionality of subprocess-based interpreters

use once_cell::sync::OnceCell;
use std::path::PathBuf;

use crate::error::{InterpreterError, Result};
use crate::process::{ProcessConfig, ProcessManager};

use super::{InterpreterKind, ScriptOutcome};

/// Locates an interpreter binary and feeds it scripts through standard input
pub struct BaseInterpreter {
    pub kind: InterpreterKind,
    /// Candidate binary names, tried in order
    pub binaries: Vec<String>,
    /// Arguments making the binary read its program from stdin
    pub stdin_args: Vec<String>,
    executable: OnceCell<Option<PathBuf>>,
}

impl BaseInterpreter {
    pub fn new(kind: InterpreterKind, binaries: &[&str], stdin_args: &[&str]) -> Self {
        Self {
            kind,
            binaries: binaries.iter().map(|b| b.to_string()).collect(),
            stdin_args: stdin_args.iter().map(|a| a.to_string()).collect(),
            executable: OnceCell::new(),
        }
    }

    /// First candidate binary found on PATH, looked up once
    pub fn find_executable(&self) -> Option<&PathBuf> {
        self.executable
            .get_or_init(|| {
                let found = self
                    .binaries
                    .iter()
                    .find_map(|name| which::which(name).ok());
                match &found {
                    Some(path) => {
                        tracing::debug!(interpreter = %self.kind, path = %path.display(), "Interpreter found")
                    }
                    None => {
                        tracing::debug!(interpreter = %self.kind, candidates = ?self.binaries, "Interpreter not found")
                    }
                }
                found
            })
            .as_ref()
    }

    pub fn runnable(&self) -> bool {
        self.find_executable().is_some()
    }

    /// Pipe `source` into the interpreter and capture everything it reports
    pub fn run_source(&self, source: String) -> Result<ScriptOutcome> {
        let executable = self.find_executable().ok_or_else(|| InterpreterError::MissingBackend {
            interpreter: self.kind.name().to_string(),
            translator: None,
            suggestion: Some(format!(
                "Install one of [{}] or add it to PATH",
                self.binaries.join(", ")
            )),
        })?;

        let config = ProcessConfig::new(executable.to_string_lossy())
            .with_args(self.stdin_args.clone())
            .with_stdin(source);

        let result = ProcessManager::new().execute(config)?;
        let outcome = ScriptOutcome {
            stdout: result.stdout(),
            stderr: result.stderr(),
            exception: None,
            exit_code: result.exit_code_or_signal(),
        };

        tracing::debug!(
            interpreter = %self.kind,
            exit_code = outcome.exit_code,
            duration_ms = result.duration.as_millis() as u64,
            "Script finished"
        );

        Ok(outcome)
    }
}

/// Characters escaped inside a double-quoted literal of C-like languages
pub(crate) fn escape_double_quoted(text: &str, escape_dollar: bool, escape_at: bool) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '$' if escape_dollar => escaped.push_str("\\$"),
            '@' if escape_at => escaped.push_str("\\@"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                escaped.push_str(&format!("\\x{:02x}", c as u32))
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// Single-quoted literal where only the quote and backslash are special
pub(crate) fn escape_single_quoted(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            c => escaped.push(c),
        }
    }
    escaped
}
