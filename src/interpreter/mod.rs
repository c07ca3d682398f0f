// Script execution backends for translator functions
// One trait, five backends: a POSIX shell, Perl, Python, Ruby and an in-process Python.

pub mod base;
pub mod embedded;
pub mod environment;
pub mod perl;
pub mod python;
pub mod ruby;
pub mod shell;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TransError};

pub use base::BaseInterpreter;
pub use embedded::EmbeddedPythonInterpreter;
pub use environment::{Environment, Value};
pub use perl::PerlInterpreter;
pub use python::PythonInterpreter;
pub use ruby::RubyInterpreter;
pub use shell::ShellInterpreter;

/// Backend selected by a translator's `TRANSLATOR_INTERPRETER` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpreterKind {
    Shell,
    Perl,
    Python,
    Ruby,
    EmbeddedPython,
}

impl InterpreterKind {
    pub const ALL: [InterpreterKind; 5] = [
        InterpreterKind::Shell,
        InterpreterKind::Perl,
        InterpreterKind::Python,
        InterpreterKind::Ruby,
        InterpreterKind::EmbeddedPython,
    ];

    /// Configuration-visible name
    pub fn name(self) -> &'static str {
        match self {
            InterpreterKind::Shell => "sh",
            InterpreterKind::Perl => "perl",
            InterpreterKind::Python => "python",
            InterpreterKind::Ruby => "ruby",
            InterpreterKind::EmbeddedPython => "builtin-python",
        }
    }

    pub fn available_names() -> Vec<String> {
        Self::ALL.iter().map(|kind| kind.name().to_string()).collect()
    }
}

impl FromStr for InterpreterKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sh" | "shell" => Ok(InterpreterKind::Shell),
            "perl" => Ok(InterpreterKind::Perl),
            "python" | "python3" => Ok(InterpreterKind::Python),
            "ruby" => Ok(InterpreterKind::Ruby),
            "builtin" | "builtin-python" | "embedded-python" => Ok(InterpreterKind::EmbeddedPython),
            _ => Err(()),
        }
    }
}

impl fmt::Display for InterpreterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Captured result of one script execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exception text reported by an in-process backend
    pub exception: Option<String>,
    pub exit_code: i32,
}

impl ScriptOutcome {
    /// Exit code 0 without exception is the only success
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.exception.is_none()
    }
}

/// A script execution backend.
///
/// Callers check [`Interpreter::runnable`] before [`Interpreter::run`]; running an
/// unavailable backend fails with `InterpreterError::MissingBackend`.
pub trait Interpreter: Send + Sync {
    fn kind(&self) -> InterpreterKind;

    /// Name of the interpreter as written in definition files
    fn interpreter(&self) -> &str {
        self.kind().name()
    }

    fn runnable(&self) -> bool;

    /// Statements binding every environment entry in the backend's syntax
    fn preamble(&self, environment: &Environment) -> Result<String>;

    /// Execute `preamble(environment)` followed by `script`
    fn run(&self, script: &str, environment: &Environment) -> Result<ScriptOutcome>;
}

/// Holds one instance of every backend
pub struct InterpreterRegistry {
    shell: ShellInterpreter,
    perl: PerlInterpreter,
    python: PythonInterpreter,
    ruby: RubyInterpreter,
    embedded: EmbeddedPythonInterpreter,
}

impl InterpreterRegistry {
    pub fn new() -> Self {
        Self {
            shell: ShellInterpreter::new(),
            perl: PerlInterpreter::new(),
            python: PythonInterpreter::new(),
            ruby: RubyInterpreter::new(),
            embedded: EmbeddedPythonInterpreter::new(),
        }
    }

    /// Whether raised exceptions of the in-process backend are captured as data
    pub fn with_exception_interception(mut self, intercept: bool) -> Self {
        self.embedded = self.embedded.with_exception_interception(intercept);
        self
    }

    pub fn get(&self, kind: InterpreterKind) -> &dyn Interpreter {
        match kind {
            InterpreterKind::Shell => &self.shell,
            InterpreterKind::Perl => &self.perl,
            InterpreterKind::Python => &self.python,
            InterpreterKind::Ruby => &self.ruby,
            InterpreterKind::EmbeddedPython => &self.embedded,
        }
    }

    /// Runnable backends of this host
    pub fn available(&self) -> Vec<InterpreterKind> {
        InterpreterKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).runnable())
            .collect()
    }
}

impl Default for InterpreterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject names no backend can bind
pub(crate) fn check_variable_name(interpreter: &str, name: &str) -> Result<()> {
    if environment::is_valid_identifier(name) {
        Ok(())
    } else {
        Err(TransError::from(
            crate::error::InterpreterError::InvalidVariableName {
                interpreter: interpreter.to_string(),
                variable: name.to_string(),
            },
        ))
    }
}

/// Variable name used in the backend's preamble.
///
/// Names colliding with a reserved word of the backend get a leading underscore,
/// so `in` is bound as `_in` in Python and Ruby.
pub(crate) fn binding_name<'a>(name: &'a str, reserved: &[&str]) -> std::borrow::Cow<'a, str> {
    if reserved.contains(&name) {
        std::borrow::Cow::Owned(format!("_{name}"))
    } else {
        std::borrow::Cow::Borrowed(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names_are_prefixed() {
        assert_eq!(binding_name("in", &["in", "def"]), "_in");
        assert_eq!(binding_name("out", &["in", "def"]), "out");
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in InterpreterKind::ALL {
            assert_eq!(kind.name().parse::<InterpreterKind>(), Ok(kind));
        }
        assert_eq!("python3".parse::<InterpreterKind>(), Ok(InterpreterKind::Python));
        assert!("tcl".parse::<InterpreterKind>().is_err());
    }

    #[test]
    fn test_outcome_success_rule() {
        let mut outcome = ScriptOutcome::default();
        assert!(outcome.success());
        outcome.exception = Some("ValueError".to_string());
        assert!(!outcome.success());
        outcome.exception = None;
        outcome.exit_code = 2;
        assert!(!outcome.success());
    }

    #[test]
    fn test_registry_dispatches_by_kind() {
        let registry = InterpreterRegistry::new();
        for kind in InterpreterKind::ALL {
            assert_eq!(registry.get(kind).kind(), kind);
        }
    }
}
