// AutoTrans - Library module
// Discovery, resolution and execution of image translators

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod inclusion;
pub mod interpreter;
pub mod level;
pub mod logging;
pub mod process;
pub mod repository;
pub mod runner;
pub mod translator;

// Re-export main types for easier access
pub use config::Config;
pub use error::{
    exit_codes, ConfigError, ConflictError, DefinitionError, GenerationError, InterpreterError,
    ProcessError, Result, TransError, TranslatorConflict,
};
pub use filesystem::{DirectoryLister, MemoryDirectoryLister, OsDirectoryLister};
pub use inclusion::TranslatorConfig;
pub use interpreter::{
    Environment, Interpreter, InterpreterKind, InterpreterRegistry, ScriptOutcome, Value,
};
pub use level::TranslatorLevel;
pub use logging::{ColorConfig, LogConfig, LogFormat};
pub use process::{ProcessConfig, ProcessManager, ProcessResult};
pub use repository::TranslatorRepository;
pub use runner::{GenerateOptions, GenerationOutcome, TranslatorRunner};
pub use translator::{
    GenerationMode, TranslatorAction, TranslatorDefinition, TranslatorName,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

// Build information (set by build script)
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const RUST_VERSION: &str = env!("RUST_VERSION");

/// Get formatted version string with build information
pub fn version_info() -> String {
    format!("{NAME} {VERSION} (commit: {GIT_COMMIT}, rustc: {RUST_VERSION})")
}
