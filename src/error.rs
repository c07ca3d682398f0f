// Error handling framework for AutoTrans
use std::path::PathBuf;
use thiserror::Error;

use crate::level::TranslatorLevel;

pub type Result<T> = std::result::Result<T, TransError>;

/// Main error type for AutoTrans
#[derive(Debug, Error)]
pub enum TransError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<ConfigError>),

    #[error("Translator definition error: {0}")]
    Definition(#[from] Box<DefinitionError>),

    #[error("Translator conflict: {0}")]
    Conflict(#[from] Box<ConflictError>),

    #[error("Interpreter error: {0}")]
    Interpreter(#[from] Box<InterpreterError>),

    #[error("Image generation failed: {0}")]
    Generation(#[from] Box<GenerationError>),

    #[error("Process execution failed: {0}")]
    Process(#[from] Box<ProcessError>),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid YAML syntax: {message}")]
    InvalidYaml {
        message: String,
        line: Option<u32>,
        column: Option<u32>,
        file_path: Option<PathBuf>,
    },

    #[error("Configuration file not found: {path}")]
    NotFound {
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("Invalid configuration value: {message}")]
    InvalidValue {
        message: String,
        field: String,
        value: String,
        expected: String,
    },

    #[error("Invalid translator level '{level}' for {operation}")]
    InvalidLevel { level: String, operation: String },
}

/// Errors raised while reading a translator definition file
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Malformed definition {path}:{line}: {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Unterminated block '{marker}' opened at {path}:{line}")]
    UnterminatedBlock {
        path: PathBuf,
        line: usize,
        marker: String,
    },

    #[error("Translator {translator} declares neither a command line nor a script")]
    MissingAction { translator: String, path: PathBuf },

    #[error("Translator {translator} declares both a command line and a script")]
    AmbiguousAction { translator: String, path: PathBuf },

    #[error("Translator {translator} has no output extension for {mode} mode")]
    MissingOutputExtension {
        translator: String,
        mode: String,
        path: PathBuf,
    },

    #[error("Unknown interpreter '{interpreter}' in {path}")]
    UnknownInterpreter {
        interpreter: String,
        path: PathBuf,
        available: Vec<String>,
    },
}

/// One group of translators competing for the same source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConflict {
    pub full_source: String,
    pub translators: Vec<String>,
}

/// Two or more included translators claim the same source at the active level
#[derive(Debug, Error)]
#[error("{} conflicting translator group(s) at {level} level: {}", .conflicts.len(), describe_conflicts(.conflicts))]
pub struct ConflictError {
    pub level: TranslatorLevel,
    pub conflicts: Vec<TranslatorConflict>,
    /// Configuration snippet that keeps the first translator of each group
    pub snippet: String,
}

fn describe_conflicts(conflicts: &[TranslatorConflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("{} <- [{}]", c.full_source, c.translators.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Script backend errors
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("Interpreter '{interpreter}' is not available on this host")]
    MissingBackend {
        interpreter: String,
        translator: Option<String>,
        suggestion: Option<String>,
    },

    #[error("Interpreter '{interpreter}' cannot represent {kind} value of '{variable}'")]
    UnsupportedValue {
        interpreter: String,
        variable: String,
        kind: String,
    },

    #[error("Invalid variable name '{variable}' for interpreter '{interpreter}'")]
    InvalidVariableName {
        interpreter: String,
        variable: String,
    },

    #[error("Script raised in interpreter '{interpreter}': {exception}")]
    ScriptRaised {
        interpreter: String,
        exception: String,
        stdout: String,
        stderr: String,
    },
}

/// Per-image generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No translator found for {path}")]
    NoTranslator { path: PathBuf },

    #[error("Translator {translator} failed with exit code {exit_code} on {input}")]
    ExecutionFailed {
        translator: String,
        input: PathBuf,
        exit_code: i32,
        stdout: String,
        stderr: String,
        exception: Option<String>,
    },
}

/// Process execution errors with detailed context
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Process timeout after {duration:?}: {command}")]
    Timeout {
        command: String,
        duration: std::time::Duration,
    },

    #[error("Command not found: {command}")]
    CommandNotFound {
        command: String,
        suggestion: Option<String>,
    },

    #[error("Process spawn failed: {command}")]
    SpawnFailed { command: String, error: String },

    #[error("Output capture failed: {message}")]
    OutputCaptureFailed { message: String, command: String },
}

/// Format errors with colors and context
pub struct ErrorFormatter {
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format an error with context and colors
    pub fn format_error(&self, error: &TransError) -> String {
        use tracing::error;

        match error {
            TransError::Config(_) => {
                error!(error_type = "config", error = %error, "Configuration error occurred");
            }
            TransError::Definition(_) => {
                error!(error_type = "definition", error = %error, "Translator definition rejected");
            }
            TransError::Conflict(_) => {
                error!(error_type = "conflict", error = %error, "Translator conflict detected");
            }
            TransError::Interpreter(_) => {
                error!(error_type = "interpreter", error = %error, "Interpreter failure");
            }
            TransError::Generation(_) => {
                error!(error_type = "generation", error = %error, "Image generation failed");
            }
            TransError::Process(_) => {
                error!(error_type = "process", error = %error, "Process execution failed");
            }
            TransError::Io(_) => {
                error!(error_type = "io", error = %error, "IO operation failed");
            }
        }

        let mut output = String::new();

        if self.use_colors {
            output.push_str("\x1b[31m"); // Red color
        }
        output.push_str("Error: ");

        if self.use_colors {
            output.push_str("\x1b[0m"); // Reset color
        }

        output.push_str(&error.to_string());

        match error {
            TransError::Config(config_err) => {
                self.add_config_context(&mut output, config_err.as_ref());
            }
            TransError::Conflict(conflict_err) => {
                self.add_conflict_context(&mut output, conflict_err.as_ref());
            }
            TransError::Interpreter(interp_err) => {
                self.add_interpreter_context(&mut output, interp_err.as_ref());
            }
            TransError::Generation(gen_err) => {
                self.add_generation_context(&mut output, gen_err.as_ref());
            }
            TransError::Process(process_err) => {
                self.add_process_context(&mut output, process_err.as_ref());
            }
            _ => {}
        }

        output
    }

    fn add_config_context(&self, output: &mut String, error: &ConfigError) {
        match error {
            ConfigError::InvalidYaml {
                file_path: Some(path),
                line: Some(line),
                ..
            } => {
                output.push_str(&format!("\n  --> {}:{}", path.display(), line));
            }
            ConfigError::NotFound {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            _ => {}
        }
    }

    fn add_conflict_context(&self, output: &mut String, error: &ConflictError) {
        output.push_str("\n  Help: exclude the unwanted translators, for example:\n");
        for line in error.snippet.lines() {
            output.push_str(&format!("    {line}\n"));
        }
    }

    fn add_interpreter_context(&self, output: &mut String, error: &InterpreterError) {
        match error {
            InterpreterError::MissingBackend {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            InterpreterError::ScriptRaised { stderr, .. } if !stderr.is_empty() => {
                output.push_str(&format!("\n  Script output: {stderr}"));
            }
            _ => {}
        }
    }

    fn add_generation_context(&self, output: &mut String, error: &GenerationError) {
        if let GenerationError::ExecutionFailed { stderr, .. } = error {
            if !stderr.is_empty() {
                output.push_str(&format!("\n  Translator output: {stderr}"));
            }
        }
    }

    fn add_process_context(&self, output: &mut String, error: &ProcessError) {
        match error {
            ProcessError::CommandNotFound {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            ProcessError::Timeout { duration, .. } => {
                output.push_str(&format!("\n  Timeout: {duration:?}"));
            }
            _ => {}
        }
    }
}

/// Exit codes of the command-line front-end
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const CONFLICT_ERROR: i32 = 3;
    pub const GENERATION_FAILURE: i32 = 4;
    pub const MISSING_BACKEND: i32 = 5;
    pub const TIMEOUT_ERROR: i32 = 6;
    pub const PROCESS_ERROR: i32 = 9;
}

impl TransError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TransError::Config(_) | TransError::Definition(_) => exit_codes::CONFIG_ERROR,
            TransError::Conflict(_) => exit_codes::CONFLICT_ERROR,
            TransError::Interpreter(interp_err) => match interp_err.as_ref() {
                InterpreterError::MissingBackend { .. } => exit_codes::MISSING_BACKEND,
                _ => exit_codes::GENERATION_FAILURE,
            },
            TransError::Generation(_) => exit_codes::GENERATION_FAILURE,
            TransError::Process(process_err) => match process_err.as_ref() {
                ProcessError::Timeout { .. } => exit_codes::TIMEOUT_ERROR,
                _ => exit_codes::PROCESS_ERROR,
            },
            TransError::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }

    /// Create a user-friendly error message with context
    pub fn user_message(&self, use_colors: bool) -> String {
        let formatter = ErrorFormatter::new(use_colors);
        formatter.format_error(self)
    }
}

impl From<ConfigError> for TransError {
    fn from(error: ConfigError) -> Self {
        TransError::Config(Box::new(error))
    }
}

impl From<DefinitionError> for TransError {
    fn from(error: DefinitionError) -> Self {
        TransError::Definition(Box::new(error))
    }
}

impl From<ConflictError> for TransError {
    fn from(error: ConflictError) -> Self {
        TransError::Conflict(Box::new(error))
    }
}

impl From<InterpreterError> for TransError {
    fn from(error: InterpreterError) -> Self {
        TransError::Interpreter(Box::new(error))
    }
}

impl From<GenerationError> for TransError {
    fn from(error: GenerationError) -> Self {
        TransError::Generation(Box::new(error))
    }
}

impl From<ProcessError> for TransError {
    fn from(error: ProcessError) -> Self {
        TransError::Process(Box::new(error))
    }
}

// Conversion from serde_yaml::Error to ConfigError
impl From<serde_yaml::Error> for Box<ConfigError> {
    fn from(error: serde_yaml::Error) -> Self {
        let location = error.location();
        Box::new(ConfigError::InvalidYaml {
            message: error.to_string(),
            line: location.as_ref().map(|l| l.line() as u32),
            column: location.as_ref().map(|l| l.column() as u32),
            file_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TransError::Config(Box::new(ConfigError::InvalidValue {
            message: "test error".to_string(),
            field: "generation_mode".to_string(),
            value: "gif".to_string(),
            expected: "pdf or eps".to_string(),
        }));
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid configuration value: test error"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = TransError::from(io_error);
        assert!(error.to_string().contains("IO operation failed"));
        assert_eq!(error.exit_code(), exit_codes::GENERAL_ERROR);
    }

    #[test]
    fn test_conflict_message_and_snippet_context() {
        let error = TransError::from(ConflictError {
            level: TranslatorLevel::Document,
            conflicts: vec![TranslatorConflict {
                full_source: "svg".to_string(),
                translators: vec!["svg2pdf".to_string(), "svg2pdf_cairo".to_string()],
            }],
            snippet: "translators:\n  document:\n    svg2pdf_cairo: false\n".to_string(),
        });

        assert_eq!(error.exit_code(), exit_codes::CONFLICT_ERROR);
        assert!(error.to_string().contains("svg <- [svg2pdf, svg2pdf_cairo]"));

        let message = error.user_message(false);
        assert!(message.starts_with("Error: "));
        assert!(message.contains("svg2pdf_cairo: false"));
    }

    #[test]
    fn test_missing_backend_exit_code() {
        let error = TransError::from(InterpreterError::MissingBackend {
            interpreter: "ruby".to_string(),
            translator: Some("dia2png".to_string()),
            suggestion: None,
        });
        assert_eq!(error.exit_code(), exit_codes::MISSING_BACKEND);
    }
}
