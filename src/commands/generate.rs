// Image listing and generation

use std::path::PathBuf;

use crate::error::{exit_codes, Result};
use crate::repository::TranslatorRepository;
use crate::runner::{GenerateOptions, GenerationOutcome, TranslatorRunner};

pub fn list_images(repository: &TranslatorRepository) -> Result<i32> {
    let runner = TranslatorRunner::new(repository);
    for image in runner.get_source_images() {
        let translator = runner
            .get_translator_for(&image)
            .map(|definition| definition.name.to_string())
            .unwrap_or_default();
        println!("{}  [{translator}]", image.display());
    }
    Ok(exit_codes::SUCCESS)
}

/// Counts of one generation run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub generated: usize,
    pub up_to_date: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl GenerationSummary {
    fn record(&mut self, outcome: &GenerationOutcome) {
        match outcome {
            GenerationOutcome::Generated { .. } => self.generated += 1,
            GenerationOutcome::UpToDate { .. } => self.up_to_date += 1,
            GenerationOutcome::Skipped => self.skipped += 1,
            GenerationOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Translate `files` (every source image when empty)
pub fn generate_all(
    repository: &TranslatorRepository,
    files: &[PathBuf],
    force: bool,
    fail_fast: bool,
) -> Result<GenerationSummary> {
    let runner = TranslatorRunner::new(repository);
    let images = super::selected_images(repository, &runner, files);
    let options = GenerateOptions {
        force_generation: force,
        fail_on_error: fail_fast,
        ..GenerateOptions::default()
    };

    let mut summary = GenerationSummary::default();
    for image in &images {
        let outcome = runner.generate_image(image, None, &options)?;
        match &outcome {
            GenerationOutcome::Generated { output } => println!("{}", output.display()),
            GenerationOutcome::Failed { outcome, .. } => {
                eprintln!("{}: exit code {}", image.display(), outcome.exit_code);
            }
            _ => {}
        }
        summary.record(&outcome);
    }
    Ok(summary)
}

pub fn execute(
    repository: &TranslatorRepository,
    files: &[PathBuf],
    force: bool,
    fail_fast: bool,
) -> Result<i32> {
    let summary = generate_all(repository, files, force, fail_fast)?;
    tracing::info!(
        generated = summary.generated,
        up_to_date = summary.up_to_date,
        skipped = summary.skipped,
        failed = summary.failed,
        "Generation finished"
    );
    if summary.failed > 0 {
        Ok(exit_codes::GENERATION_FAILURE)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}
