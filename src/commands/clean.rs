// Removal of translator by-products

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::{exit_codes, Result};
use crate::repository::TranslatorRepository;
use crate::runner::TranslatorRunner;

/// Files `clean` would remove for `files` (every source image when empty)
pub fn removable_files(
    repository: &TranslatorRepository,
    files: &[PathBuf],
    include_targets: bool,
) -> Vec<PathBuf> {
    let runner = TranslatorRunner::new(repository);
    let mut removable = Vec::new();

    for image in super::selected_images(repository, &runner, files) {
        let (Some(definition), Some(output)) =
            (runner.get_translator_for(&image), runner.default_output(&image))
        else {
            continue;
        };
        removable.extend(runner.get_temporary_files(&image, &output, &definition));
        if include_targets {
            removable.extend(runner.get_target_files(&image, &output, &definition));
        }
    }
    removable.sort();
    removable.dedup();
    removable
}

pub fn execute(repository: &TranslatorRepository, files: &[PathBuf], all: bool) -> Result<i32> {
    let mut removed = 0usize;
    for path in removable_files(repository, files, all) {
        match fs::remove_file(&path) {
            Ok(()) => {
                removed += 1;
                println!("{}", path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot remove file");
            }
        }
    }
    tracing::info!(removed = removed, "Clean finished");
    Ok(exit_codes::SUCCESS)
}
