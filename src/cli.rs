// CLI interface for AutoTrans using clap
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::commands;
use crate::config::Config;
use crate::error::Result;
use crate::logging::utils;
use crate::repository::TranslatorRepository;
use crate::translator::GenerationMode;

#[derive(Parser)]
#[command(
    name = "autotrans",
    about = "AutoTrans - Resolve and run image translators for LaTeX documents",
    version = crate::VERSION,
    long_about = "AutoTrans discovers image translator definitions at the system, user and document levels, resolves which one handles each source image, and runs it to produce the figure included by the document."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Document directory (enables document-level translators)
    #[arg(short, long, global = true)]
    pub document: Option<PathBuf>,

    /// Generation mode (pdf, eps)
    #[arg(short, long, global = true)]
    pub mode: Option<String>,

    /// Control color output (auto, always, never)
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List translators and the level they are included at
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Also list installed but excluded translators
        #[arg(short, long)]
        all: bool,
    },

    /// Detect translator conflicts and missing interpreters
    Check,

    /// List the source images found in the image paths
    Images,

    /// Generate images (all source images when none is given)
    Generate {
        /// Source images to translate
        files: Vec<PathBuf>,

        /// Regenerate even when the output is up to date
        #[arg(short, long)]
        force: bool,

        /// Stop at the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Remove the files translators leave behind
    Clean {
        /// Source images whose by-products are removed
        files: Vec<PathBuf>,

        /// Also remove the generated images
        #[arg(short, long)]
        all: bool,
    },
}

impl Cli {
    pub fn run(&self) -> Result<i32> {
        self.init_logging();

        let config = self.load_config()?;
        let mut repository = TranslatorRepository::new(Arc::new(config))?;

        match &self.command {
            Commands::List { json, all } => {
                repository.sync(false)?;
                commands::list::execute(&repository, *json, *all)
            }
            Commands::Check => commands::check::execute(&mut repository),
            Commands::Images => {
                repository.sync(true)?;
                commands::generate::list_images(&repository)
            }
            Commands::Generate {
                files,
                force,
                fail_fast,
            } => {
                repository.sync(true)?;
                commands::generate::execute(&repository, files, *force, *fail_fast)
            }
            Commands::Clean { files, all } => {
                repository.sync(true)?;
                commands::clean::execute(&repository, files, *all)
            }
        }
    }

    /// Configuration file, then command-line overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let span = utils::config_loading_span(path);
                let _guard = span.enter();
                Config::from_file(path)?
            }
            None => Config::default(),
        };

        if let Some(document) = &self.document {
            config = config.with_document_directory(document.clone());
        }
        if let Some(mode) = &self.mode {
            config = config.with_generation_mode(mode.parse::<GenerationMode>()?);
        }
        config.validate()?;
        Ok(config)
    }

    fn init_logging(&self) {
        use crate::logging::{init_logging, LogConfig};

        let log_config = LogConfig::from_cli(self.verbose, self.quiet, self.color.clone());

        if let Err(e) = init_logging(log_config) {
            eprintln!("Failed to initialize logging: {e}");
        }
    }

    pub fn use_colors(&self) -> bool {
        crate::logging::LogConfig::from_cli(self.verbose, self.quiet, self.color.clone())
            .should_use_colors()
    }
}
