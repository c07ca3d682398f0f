// Logging setup for AutoTrans
use std::io::{self, IsTerminal};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

/// Environment variable holding an `EnvFilter` directive that replaces the CLI level
pub const LOG_ENV: &str = "AUTOTRANS_LOG";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format (pretty for terminals, json for programmatic use)
    pub format: LogFormat,
    /// Color output configuration
    pub color: ColorConfig,
    /// Whether to show targets (module names)
    pub show_targets: bool,
}

/// Log output format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

/// Color output configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ColorConfig {
    Auto,
    Always,
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            color: ColorConfig::Auto,
            show_targets: false,
        }
    }
}

impl LogConfig {
    /// Create logging configuration from CLI arguments
    pub fn from_cli(verbose: bool, quiet: bool, color: Option<String>) -> Self {
        let level = if quiet {
            Level::ERROR
        } else if verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };

        let color_config = match color.as_deref() {
            Some("always") => ColorConfig::Always,
            Some("never") => ColorConfig::Never,
            _ => ColorConfig::Auto,
        };

        Self {
            level,
            format: LogFormat::Pretty,
            color: color_config,
            show_targets: verbose,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Check if colors should be used based on configuration and terminal
    pub fn should_use_colors(&self) -> bool {
        match self.color {
            ColorConfig::Always => true,
            ColorConfig::Never => false,
            ColorConfig::Auto => {
                io::stderr().is_terminal()
                    && std::env::var("TERM").map_or(true, |term| term != "dumb")
                    && std::env::var("NO_COLOR").is_err()
            }
        }
    }

    fn env_filter(&self) -> EnvFilter {
        match std::env::var(LOG_ENV) {
            Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
            _ => EnvFilter::new(format!("autotrans={}", self.level)),
        }
    }
}

/// Initialize the logging system with the given configuration.
///
/// Logs go to stderr; stdout is reserved for command output. Calling this
/// twice keeps the first subscriber.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter = config.env_filter();
    let ansi = config.should_use_colors();

    let installed = match config.format {
        LogFormat::Pretty => fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .with_ansi(ansi)
            .with_target(config.show_targets)
            .try_init(),
        LogFormat::Json => fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .json()
            .try_init(),
        LogFormat::Compact => fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .with_ansi(ansi)
            .compact()
            .with_target(config.show_targets)
            .try_init(),
    };

    if let Err(e) = installed {
        tracing::debug!(error = %e, "Logging already initialized");
    }
    Ok(())
}

/// Logging utilities for common operations
pub mod utils {
    use std::path::Path;
    use tracing::{debug, error, info, span, Level, Span};

    use crate::level::TranslatorLevel;

    /// Create a span for a repository synchronization
    pub fn sync_span(detect_conflicts: bool) -> Span {
        span!(Level::DEBUG, "repository_sync", detect_conflicts = detect_conflicts)
    }

    /// Create a span for scanning one translator directory
    pub fn scan_span(level: TranslatorLevel, directory: &Path) -> Span {
        span!(Level::DEBUG, "translator_scan", level = %level, directory = %directory.display())
    }

    /// Create a span for one image generation
    pub fn generation_span(translator: &str, input: &Path) -> Span {
        span!(Level::INFO, "image_generation", translator = %translator, input = %input.display())
    }

    /// Create a span for configuration loading
    pub fn config_loading_span(config_path: &Path) -> Span {
        span!(Level::DEBUG, "config_loading", path = %config_path.display())
    }

    pub fn log_sync_completion(installed: usize, included: usize, duration_ms: u128) {
        debug!(
            installed = installed,
            included = included,
            duration_ms = duration_ms,
            "Translator repository synchronized"
        );
    }

    pub fn log_generation_start(translator: &str, input: &Path, output: &Path) {
        info!(
            translator = %translator,
            input = %input.display(),
            output = %output.display(),
            "Generating image"
        );
    }

    pub fn log_generation_completion(
        translator: &str,
        output: &Path,
        success: bool,
        duration_ms: u128,
    ) {
        if success {
            info!(
                translator = %translator,
                output = %output.display(),
                duration_ms = duration_ms,
                "Image generated"
            );
        } else {
            error!(
                translator = %translator,
                output = %output.display(),
                duration_ms = duration_ms,
                "Image generation failed"
            );
        }
    }
}
