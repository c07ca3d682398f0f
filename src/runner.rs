// Source image discovery and translator execution

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{GenerationError, InterpreterError, ProcessError, Result, TransError};
use crate::interpreter::{Environment, InterpreterRegistry, ScriptOutcome, Value};
use crate::logging::utils;
use crate::process::{ProcessConfig, ProcessManager};
use crate::repository::TranslatorRepository;
use crate::translator::{GenerationMode, TranslatorAction, TranslatorDefinition};

/// Exit code reported when a command-line translator cannot be started
const COMMAND_NOT_RUNNABLE: i32 = 127;

/// Options of [`TranslatorRunner::generate_image`]
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Skip generation when the output is not older than the input
    pub only_more_recent: bool,
    /// Generate even when the output is up to date
    pub force_generation: bool,
    /// Turn a missing translator or a failed execution into an error
    pub fail_on_error: bool,
    /// Extra bindings, applied after the standard ones
    pub variables: Environment,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            only_more_recent: true,
            force_generation: false,
            fail_on_error: false,
            variables: Environment::new(),
        }
    }
}

impl GenerateOptions {
    pub fn forced() -> Self {
        Self {
            force_generation: true,
            ..Self::default()
        }
    }

    pub fn with_fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.set(name, value);
        self
    }
}

/// What [`TranslatorRunner::generate_image`] did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// The output exists and is not older than the input; nothing ran
    UpToDate { output: PathBuf },
    Generated { output: PathBuf },
    /// The translator ran and failed
    Failed {
        output: PathBuf,
        outcome: ScriptOutcome,
    },
    /// No translator applies to the input
    Skipped,
}

impl GenerationOutcome {
    /// The freshly generated file, if any
    pub fn output(&self) -> Option<&Path> {
        match self {
            GenerationOutcome::Generated { output } => Some(output),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, GenerationOutcome::Failed { .. })
    }
}

/// Runs translators chosen by a synchronized repository
pub struct TranslatorRunner<'a> {
    repository: &'a TranslatorRepository,
    interpreters: InterpreterRegistry,
    process_manager: ProcessManager,
}

impl<'a> TranslatorRunner<'a> {
    pub fn new(repository: &'a TranslatorRepository) -> Self {
        let interpreters = InterpreterRegistry::new()
            .with_exception_interception(repository.config().intercept_script_exceptions);
        Self {
            repository,
            interpreters,
            process_manager: ProcessManager::new(),
        }
    }

    pub fn with_interpreters(mut self, interpreters: InterpreterRegistry) -> Self {
        self.interpreters = interpreters;
        self
    }

    pub fn interpreters(&self) -> &InterpreterRegistry {
        &self.interpreters
    }

    fn mode(&self) -> GenerationMode {
        self.repository.config().generation_mode
    }

    /// Files below the image paths that some included translator accepts
    pub fn get_source_images(&self) -> BTreeSet<PathBuf> {
        let config = self.repository.config();
        let mut images = BTreeSet::new();
        for directory in config.effective_image_paths() {
            let files = match self
                .repository
                .lister()
                .list_files(&directory, config.recursive_image_search)
            {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(directory = %directory.display(), error = %e, "Cannot search images");
                    continue;
                }
            };
            images.extend(
                files
                    .into_iter()
                    .filter(|file| self.get_translator_for(file).is_some()),
            );
        }
        tracing::debug!(count = images.len(), "Source images found");
        images
    }

    /// Translator for `path`, chosen by the longest matching input extension
    pub fn get_translator_for(&self, path: &Path) -> Option<Arc<TranslatorDefinition>> {
        self.resolve(path).map(|(definition, _)| definition)
    }

    /// Winning translator and the extension it matched
    fn resolve(&self, path: &Path) -> Option<(Arc<TranslatorDefinition>, String)> {
        let file_name = path.file_name()?.to_str()?;

        let mut best: Option<(Arc<TranslatorDefinition>, String)> = None;
        for candidate in self.repository.winning_translators() {
            let Some(extension) = candidate.matching_extension(file_name).map(str::to_string)
            else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((current, current_ext)) => {
                    Self::preference(&candidate, &extension) > Self::preference(current, current_ext)
                }
            };
            if better {
                best = Some((candidate, extension));
            }
        }
        best
    }

    /// Ordering key for candidates: longer extension, declared extensions, explicit source,
    /// modifiers on a declared extension, smaller name
    fn preference(
        definition: &TranslatorDefinition,
        extension: &str,
    ) -> (usize, bool, bool, bool, std::cmp::Reverse<String>) {
        let declared = definition.input_extensions_declared;
        let explicit = definition
            .name
            .source()
            .eq_ignore_ascii_case(extension.trim_start_matches('.'));
        (
            extension.len(),
            declared,
            explicit,
            declared && !definition.name.target_modifiers().is_empty(),
            std::cmp::Reverse(definition.name.to_string()),
        )
    }

    /// Default output: the input name with its matched extension replaced, in the input's directory
    pub fn default_output(&self, input: &Path) -> Option<PathBuf> {
        let (definition, extension) = self.resolve(input)?;
        Some(Self::output_path(input, &definition, &extension))
    }

    fn output_path(input: &Path, definition: &TranslatorDefinition, extension: &str) -> PathBuf {
        let base = strip_extension(input, extension);
        input.with_file_name(format!("{base}{}", definition.output_extension()))
    }

    /// Generate `output` (or the default output) from `input`
    pub fn generate_image(
        &self,
        input: &Path,
        output: Option<&Path>,
        options: &GenerateOptions,
    ) -> Result<GenerationOutcome> {
        let Some((definition, extension)) = self.resolve(input) else {
            if options.fail_on_error {
                return Err(GenerationError::NoTranslator {
                    path: input.to_path_buf(),
                }
                .into());
            }
            tracing::warn!(input = %input.display(), "No translator found");
            return Ok(GenerationOutcome::Skipped);
        };

        // Command lines run in the input's directory, so bindings hold absolute paths
        let input = &absolute(input);
        let output = absolute(
            &output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| Self::output_path(input, &definition, &extension)),
        );

        let span = utils::generation_span(definition.name.as_str(), input);
        let _guard = span.enter();

        if options.only_more_recent && !options.force_generation && self.is_up_to_date(input, &output) {
            tracing::debug!(output = %output.display(), "Output is up to date");
            return Ok(GenerationOutcome::UpToDate { output });
        }

        if let TranslatorAction::Script { interpreter, .. } = &definition.action {
            if !self.interpreters.get(*interpreter).runnable() {
                return Err(InterpreterError::MissingBackend {
                    interpreter: interpreter.name().to_string(),
                    translator: Some(definition.name.to_string()),
                    suggestion: Some(format!(
                        "Install {} or exclude {} in the configuration",
                        interpreter.name(),
                        definition.name
                    )),
                }
                .into());
            }
        }

        let mut environment = self.build_environment(input, &output, &definition, &extension);
        environment.extend(&options.variables);

        utils::log_generation_start(definition.name.as_str(), input, &output);
        let started = Instant::now();
        let outcome = match &definition.action {
            TranslatorAction::CommandLine(arguments) => {
                self.run_command_line(arguments, &environment, input)?
            }
            TranslatorAction::Script { interpreter, body } => {
                self.interpreters.get(*interpreter).run(body, &environment)?
            }
        };
        let success = outcome.success();
        utils::log_generation_completion(
            definition.name.as_str(),
            &output,
            success,
            started.elapsed().as_millis(),
        );

        if success {
            return Ok(GenerationOutcome::Generated { output });
        }

        tracing::error!(
            translator = %definition.name,
            input = %input.display(),
            exit_code = outcome.exit_code,
            exception = ?outcome.exception,
            stderr = %outcome.stderr.trim_end(),
            "Translator failed"
        );
        if options.fail_on_error {
            return Err(GenerationError::ExecutionFailed {
                translator: definition.name.to_string(),
                input: input.to_path_buf(),
                exit_code: outcome.exit_code,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                exception: outcome.exception,
            }
            .into());
        }
        Ok(GenerationOutcome::Failed { output, outcome })
    }

    fn is_up_to_date(&self, input: &Path, output: &Path) -> bool {
        let lister = self.repository.lister();
        match (lister.modified(output), lister.modified(input)) {
            (Some(output_time), Some(input_time)) => output_time >= input_time,
            _ => false,
        }
    }

    fn run_command_line(
        &self,
        arguments: &[String],
        environment: &Environment,
        input: &Path,
    ) -> Result<ScriptOutcome> {
        let expanded: Vec<String> = arguments
            .iter()
            .map(|argument| environment.substitute_with(argument, |name| std::env::var(name).ok()))
            .collect();
        let Some((command, args)) = expanded.split_first() else {
            return Ok(ScriptOutcome {
                stderr: "empty command line".to_string(),
                exit_code: COMMAND_NOT_RUNNABLE,
                ..ScriptOutcome::default()
            });
        };

        let mut config = ProcessConfig::new(command.as_str()).with_args(args.to_vec());
        if let Some(directory) = input.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            config = config.with_working_dir(directory.to_path_buf());
        }

        match self.process_manager.execute(config) {
            Ok(result) => Ok(ScriptOutcome {
                stdout: result.stdout(),
                stderr: result.stderr(),
                exception: None,
                exit_code: result.exit_code_or_signal(),
            }),
            Err(TransError::Process(error)) => match *error {
                ProcessError::CommandNotFound { .. } | ProcessError::SpawnFailed { .. } => {
                    Ok(ScriptOutcome {
                        stderr: error.to_string(),
                        exit_code: COMMAND_NOT_RUNNABLE,
                        ..ScriptOutcome::default()
                    })
                }
                other => Err(other.into()),
            },
            Err(other) => Err(other),
        }
    }

    /// Standard bindings of a translator execution
    pub fn build_environment(
        &self,
        input: &Path,
        output: &Path,
        definition: &TranslatorDefinition,
        input_extension: &str,
    ) -> Environment {
        let mode = self.mode();
        let output_extension = definition
            .output_extensions
            .iter()
            .find(|ext| file_name_of(output).to_lowercase().ends_with(ext.as_str()))
            .cloned()
            .or_else(|| {
                output
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
            })
            .unwrap_or_default();
        let output_base = strip_extension(output, &output_extension);
        let output_dir = parent_of(output);

        Environment::new()
            .with("in", input)
            .with("out", output)
            .with("indir", parent_of(input))
            .with("inbasename", strip_extension(input, input_extension))
            .with("inext", input_extension)
            .with("inexts", definition.input_extensions.clone())
            .with("outdir", output_dir.clone())
            .with("outbasename", output_base.clone())
            .with("outext", output_extension)
            .with("outexts", definition.output_extensions.clone())
            .with("outwoext", output_dir.join(&output_base))
            .with("ispdfmode", mode == GenerationMode::Pdf)
            .with("isepsmode", mode == GenerationMode::Eps)
            .with("translator", definition.name.as_str())
    }

    /// Files the translator leaves behind for `input` -> `output`
    pub fn get_temporary_files(
        &self,
        input: &Path,
        output: &Path,
        definition: &TranslatorDefinition,
    ) -> Vec<PathBuf> {
        self.expand_patterns(input, output, definition, &definition.files_to_clean)
    }

    /// Files the translator produces for `input` -> `output`
    pub fn get_target_files(
        &self,
        input: &Path,
        output: &Path,
        definition: &TranslatorDefinition,
    ) -> Vec<PathBuf> {
        self.expand_patterns(input, output, definition, &definition.target_files)
    }

    /// Substitute `$var` references; relative results are taken from the output directory
    fn expand_patterns(
        &self,
        input: &Path,
        output: &Path,
        definition: &TranslatorDefinition,
        patterns: &[String],
    ) -> Vec<PathBuf> {
        let extension = definition
            .matching_extension(&file_name_of(input))
            .or_else(|| definition.input_extensions.first().map(String::as_str))
            .unwrap_or_default()
            .to_string();
        let environment = self.build_environment(input, output, definition, &extension);
        let output_dir = parent_of(output);

        patterns
            .iter()
            .map(|pattern| PathBuf::from(environment.substitute(pattern)))
            .map(|path| {
                if path.is_relative() && !output_dir.as_os_str().is_empty() {
                    output_dir.join(path)
                } else {
                    path
                }
            })
            .collect()
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// File name of `path` without the trailing `extension` (compared case-insensitively)
fn strip_extension(path: &Path, extension: &str) -> String {
    let name = file_name_of(path);
    let cut = name.len().saturating_sub(extension.len());
    if !extension.is_empty()
        && name.is_char_boundary(cut)
        && name[cut..].eq_ignore_ascii_case(extension)
    {
        name[..cut].to_string()
    } else {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::filesystem::MemoryDirectoryLister;
    use std::time::{Duration, SystemTime};

    fn repository(lister: MemoryDirectoryLister) -> TranslatorRepository {
        let config = Config::default()
            .with_installation_directory("/sys")
            .with_user_directory("/home/translators")
            .with_document_directory("/doc");
        let mut repo =
            TranslatorRepository::with_lister(Arc::new(config), Arc::new(lister)).unwrap();
        repo.sync(true).unwrap();
        repo
    }

    fn translators() -> MemoryDirectoryLister {
        MemoryDirectoryLister::new()
            .with_file(
                "/sys/svg2pdf.transdef1",
                "INPUT_EXTENSIONS = .svg .svgz\nOUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = inkscape $in -o $out\n",
            )
            .with_file(
                "/sys/svg2pdf+tex.transdef1",
                "INPUT_EXTENSIONS = .svg+tex\nOUTPUT_EXTENSIONS = .pdf\nFILES_TO_CLEAN = $outwoext.pdftex_t ${outbasename}.log\nCOMMAND_LINE = inkscape --latex $in -o $out\n",
            )
    }

    #[test]
    fn test_compound_extension_wins() {
        let repo = repository(translators());
        let runner = TranslatorRunner::new(&repo);

        let plain = runner.get_translator_for(Path::new("/doc/fig.SVG")).unwrap();
        assert_eq!(plain.name.as_str(), "svg2pdf");
        let tex = runner.get_translator_for(Path::new("/doc/fig.svg+tex")).unwrap();
        assert_eq!(tex.name.as_str(), "svg2pdf+tex");
        assert!(runner.get_translator_for(Path::new("/doc/fig.png")).is_none());
    }

    #[test]
    fn test_defaulted_extension_ignores_modifiers() {
        let lister = MemoryDirectoryLister::new()
            .with_file(
                "/sys/svg2pdf.transdef1",
                "OUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = inkscape $in -o $out\n",
            )
            .with_file(
                "/sys/svg2pdf+tex.transdef1",
                "OUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = inkscape --latex $in -o $out\n",
            );
        let repo = repository(lister);
        let runner = TranslatorRunner::new(&repo);

        let chosen = runner.get_translator_for(Path::new("/doc/fig.svg")).unwrap();
        assert_eq!(chosen.name.as_str(), "svg2pdf");
    }

    #[test]
    fn test_declared_extension_beats_defaulted() {
        let lister = MemoryDirectoryLister::new()
            .with_file(
                "/sys/svg2pdf.transdef1",
                "OUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = inkscape $in -o $out\n",
            )
            .with_file(
                "/sys/svg2pdf+tex.transdef1",
                "INPUT_EXTENSIONS = .svg\nOUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = inkscape --latex $in -o $out\n",
            );
        let repo = repository(lister);
        let runner = TranslatorRunner::new(&repo);

        let chosen = runner.get_translator_for(Path::new("/doc/fig.svg")).unwrap();
        assert_eq!(chosen.name.as_str(), "svg2pdf+tex");
    }

    #[test]
    fn test_default_output_replaces_matched_extension() {
        let repo = repository(translators());
        let runner = TranslatorRunner::new(&repo);
        assert_eq!(
            runner.default_output(Path::new("/doc/img/fig.svg+tex")),
            Some(PathBuf::from("/doc/img/fig.pdf"))
        );
    }

    #[test]
    fn test_environment_bindings() {
        let repo = repository(translators());
        let runner = TranslatorRunner::new(&repo);
        let definition = repo.translator("svg2pdf").unwrap();

        let env = runner.build_environment(
            Path::new("/doc/img/fig.svg"),
            Path::new("/doc/img/fig.pdf"),
            &definition,
            ".svg",
        );
        let names: Vec<_> = env.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "in", "out", "indir", "inbasename", "inext", "inexts", "outdir", "outbasename",
                "outext", "outexts", "outwoext", "ispdfmode", "isepsmode", "translator"
            ]
        );
        assert_eq!(env.get("inbasename"), Some(&Value::from("fig")));
        assert_eq!(env.get("outwoext"), Some(&Value::from("/doc/img/fig")));
        assert_eq!(env.get("ispdfmode"), Some(&Value::Bool(true)));
        assert_eq!(
            env.get("inexts"),
            Some(&Value::from(vec![".svg".to_string(), ".svgz".to_string()]))
        );
    }

    #[test]
    fn test_temporary_and_target_files() {
        let repo = repository(translators());
        let runner = TranslatorRunner::new(&repo);
        let definition = repo.translator("svg2pdf+tex").unwrap();

        let input = Path::new("/doc/fig.svg+tex");
        let output = Path::new("/doc/fig.pdf");
        assert_eq!(
            runner.get_temporary_files(input, output, &definition),
            vec![PathBuf::from("/doc/fig.pdftex_t"), PathBuf::from("/doc/fig.log")]
        );
        assert_eq!(
            runner.get_target_files(input, output, &definition),
            vec![PathBuf::from("/doc/fig.pdf")]
        );
    }

    #[test]
    fn test_up_to_date_output_is_not_regenerated() {
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let new = SystemTime::UNIX_EPOCH + Duration::from_secs(2_000);
        let lister = translators()
            .with_file_modified("/doc/fig.svg", "<svg/>", old)
            .with_file_modified("/doc/fig.pdf", "%PDF", new);
        let repo = repository(lister);
        let runner = TranslatorRunner::new(&repo);

        // inkscape is never spawned: the output is newer than the input
        let outcome = runner
            .generate_image(Path::new("/doc/fig.svg"), None, &GenerateOptions::default())
            .unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::UpToDate {
                output: PathBuf::from("/doc/fig.pdf")
            }
        );
        assert_eq!(outcome.output(), None);
    }

    #[test]
    fn test_missing_translator() {
        let repo = repository(translators());
        let runner = TranslatorRunner::new(&repo);
        let skipped = runner
            .generate_image(Path::new("/doc/fig.png"), None, &GenerateOptions::default())
            .unwrap();
        assert_eq!(skipped, GenerationOutcome::Skipped);

        let err = runner
            .generate_image(
                Path::new("/doc/fig.png"),
                None,
                &GenerateOptions::default().with_fail_on_error(true),
            )
            .unwrap_err();
        assert!(matches!(err, TransError::Generation(_)));
    }

    #[test]
    fn test_source_images() {
        let lister = translators()
            .with_file("/doc/a.svg", "")
            .with_file("/doc/figures/b.svg+tex", "")
            .with_file("/doc/figures/c.png", "")
            .with_file("/doc/main.tex", "");
        let repo = repository(lister);
        let runner = TranslatorRunner::new(&repo);

        let images: Vec<_> = runner.get_source_images().into_iter().collect();
        assert_eq!(
            images,
            vec![PathBuf::from("/doc/a.svg"), PathBuf::from("/doc/figures/b.svg+tex")]
        );
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension(Path::new("/x/Fig.SVG+TEX"), ".svg+tex"), "Fig");
        assert_eq!(strip_extension(Path::new("/x/fig.pdf"), ".eps"), "fig");
        assert_eq!(strip_extension(Path::new("/x/noext"), ""), "noext");
    }
}
