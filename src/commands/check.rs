// Conflict and interpreter checks

use crate::error::{exit_codes, Result};
use crate::interpreter::InterpreterRegistry;
use crate::repository::TranslatorRepository;

/// Included script translators whose interpreter is not runnable here
pub fn missing_backends(
    repository: &TranslatorRepository,
    interpreters: &InterpreterRegistry,
) -> Vec<(String, String)> {
    repository
        .included_translators()
        .iter()
        .filter_map(|definition| {
            let kind = definition.interpreter()?;
            (!interpreters.get(kind).runnable())
                .then(|| (definition.name.to_string(), kind.name().to_string()))
        })
        .collect()
}

/// Synchronize with conflict detection; conflicts surface as errors
pub fn execute(repository: &mut TranslatorRepository) -> Result<i32> {
    repository.sync(true)?;

    let interpreters = InterpreterRegistry::new();
    let missing = missing_backends(repository, &interpreters);
    let included = repository.get_included_translators_with_levels().len();

    if missing.is_empty() {
        println!("No conflicts among {included} included translators");
        return Ok(exit_codes::SUCCESS);
    }

    for (translator, interpreter) in &missing {
        println!("{translator}: interpreter '{interpreter}' is not available");
    }
    Ok(exit_codes::MISSING_BACKEND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::filesystem::MemoryDirectoryLister;
    use std::sync::Arc;

    #[test]
    fn test_command_line_translators_never_miss_a_backend() {
        let lister = MemoryDirectoryLister::new().with_file(
            "/sys/svg2pdf.transdef1",
            "OUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = rsvg-convert -f pdf -o $out $in\n",
        );
        let config = Config::default()
            .with_installation_directory("/sys")
            .with_user_directory("/usr");
        let mut repo =
            TranslatorRepository::with_lister(Arc::new(config), Arc::new(lister)).unwrap();
        repo.sync(true).unwrap();

        assert!(missing_backends(&repo, &InterpreterRegistry::new()).is_empty());
    }

    #[cfg(not(feature = "embedded-python"))]
    #[test]
    fn test_builtin_python_is_missing_without_feature() {
        let lister = MemoryDirectoryLister::new().with_file(
            "/sys/dot2pdf.transdef2",
            "OUTPUT_EXTENSIONS: .pdf\nTRANSLATOR_INTERPRETER: builtin-python\nTRANSLATOR_FUNCTION: pass\n",
        );
        let config = Config::default()
            .with_installation_directory("/sys")
            .with_user_directory("/usr");
        let mut repo =
            TranslatorRepository::with_lister(Arc::new(config), Arc::new(lister)).unwrap();
        repo.sync(true).unwrap();

        assert_eq!(
            missing_backends(&repo, &InterpreterRegistry::new()),
            vec![("dot2pdf".to_string(), "builtin-python".to_string())]
        );
    }
}
