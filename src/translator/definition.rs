// Translator definitions: the immutable record built from a definition file
// for the active generation mode

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConfigError, DefinitionError, Result, TransError};
use crate::interpreter::InterpreterKind;
use crate::level::TranslatorLevel;

use super::name::TranslatorName;
use super::reader::{DefinitionEntries, DefinitionEntry, DefinitionFormat, EntryValue};

const INPUT_EXTENSIONS: &str = "INPUT_EXTENSIONS";
const OUTPUT_EXTENSIONS: &str = "OUTPUT_EXTENSIONS";
const COMMAND_LINE: &str = "COMMAND_LINE";
const TRANSLATOR_FUNCTION: &str = "TRANSLATOR_FUNCTION";
const TRANSLATOR_INTERPRETER: &str = "TRANSLATOR_INTERPRETER";
const FILES_TO_CLEAN: &str = "FILES_TO_CLEAN";
const TARGET_FILES: &str = "TARGET_FILES";
const DEPENDENCY_KEYS: [&str; 3] = [
    "TRANSLATOR_DEPENDENCIES",
    "TRANSLATOR_PERL_DEPENDENCIES",
    "TRANSLATOR_PYTHON_DEPENDENCIES",
];

const KNOWN_KEYS: [&str; 10] = [
    INPUT_EXTENSIONS,
    OUTPUT_EXTENSIONS,
    COMMAND_LINE,
    TRANSLATOR_FUNCTION,
    TRANSLATOR_INTERPRETER,
    FILES_TO_CLEAN,
    TARGET_FILES,
    DEPENDENCY_KEYS[0],
    DEPENDENCY_KEYS[1],
    DEPENDENCY_KEYS[2],
];

/// Output flavour selected globally for a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Vector output for pdfLaTeX-style toolchains
    #[default]
    #[serde(alias = "vector")]
    Pdf,
    /// PostScript output for latex/dvips-style toolchains
    #[serde(alias = "raster")]
    Eps,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMode::Pdf => "pdf",
            GenerationMode::Eps => "eps",
        }
    }

    /// Mode names accepted after `for` in definition files
    fn entry_names(self) -> [&'static str; 2] {
        match self {
            GenerationMode::Pdf => ["pdf", "vector"],
            GenerationMode::Eps => ["eps", "raster"],
        }
    }
}

impl FromStr for GenerationMode {
    type Err = TransError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" | "vector" => Ok(GenerationMode::Pdf),
            "eps" | "raster" => Ok(GenerationMode::Eps),
            other => Err(ConfigError::InvalidValue {
                message: format!("unknown generation mode '{other}'"),
                field: "generation_mode".to_string(),
                value: s.to_string(),
                expected: "pdf, vector, eps or raster".to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What running a translator means: exactly one of a command line or a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TranslatorAction {
    /// Argument vector; `$var` references are expanded before spawning
    CommandLine(Vec<String>),
    Script {
        interpreter: InterpreterKind,
        body: String,
    },
}

/// A translator loaded from one definition file
#[derive(Debug, Clone, Serialize)]
pub struct TranslatorDefinition {
    pub name: TranslatorName,
    /// Level of the directory the definition was installed from
    pub level: TranslatorLevel,
    pub file: PathBuf,
    /// Lower-case extensions with a leading dot, possibly compound (`.svg+tex`)
    pub input_extensions: Vec<String>,
    /// Whether `input_extensions` comes from the definition rather than the `.<source>` default
    pub input_extensions_declared: bool,
    /// Output extensions of the active generation mode, first one preferred
    pub output_extensions: Vec<String>,
    pub action: TranslatorAction,
    pub files_to_clean: Vec<String>,
    pub target_files: Vec<String>,
    pub dependencies: Vec<String>,
}

impl TranslatorDefinition {
    /// Read and build a definition from the content of `path`
    pub fn load(
        name: &str,
        format: DefinitionFormat,
        path: &Path,
        content: &str,
        level: TranslatorLevel,
        mode: GenerationMode,
    ) -> Result<Self> {
        let reader = format.reader();
        let entries = reader.read_translator_file(path, content)?;
        Self::from_entries(
            TranslatorName::new(name),
            level,
            path,
            &entries,
            mode,
            reader.default_interpreter(),
        )
    }

    pub fn from_entries(
        name: TranslatorName,
        level: TranslatorLevel,
        path: &Path,
        entries: &DefinitionEntries,
        mode: GenerationMode,
        default_interpreter: InterpreterKind,
    ) -> Result<Self> {
        for entry in entries.values() {
            if !KNOWN_KEYS.contains(&entry.key.as_str()) {
                tracing::debug!(
                    translator = %name,
                    key = %entry.key,
                    file = %path.display(),
                    "Ignoring unknown definition key"
                );
            }
        }

        let input_extensions = match select(entries, INPUT_EXTENSIONS, mode) {
            Some(entry) => normalize_extensions(&entry.value),
            None => Vec::new(),
        };
        let input_extensions_declared = !input_extensions.is_empty();
        // A translator without declared inputs reads files named after its source type
        let input_extensions = if !input_extensions_declared {
            vec![format!(".{}", name.source().to_ascii_lowercase())]
        } else {
            input_extensions
        };

        let output_extensions = select(entries, OUTPUT_EXTENSIONS, mode)
            .map(|entry| normalize_extensions(&entry.value))
            .unwrap_or_default();
        if output_extensions.is_empty() {
            return Err(DefinitionError::MissingOutputExtension {
                translator: name.to_string(),
                mode: mode.to_string(),
                path: path.to_path_buf(),
            }
            .into());
        }

        let action = Self::action(&name, path, entries, mode, default_interpreter)?;

        let words = |key: &str| {
            select(entries, key, mode)
                .map(|entry| entry.value.as_words())
                .unwrap_or_default()
        };

        let target_files = match words(TARGET_FILES) {
            files if files.is_empty() => vec!["$out".to_string()],
            files => files,
        };
        let dependencies = DEPENDENCY_KEYS
            .iter()
            .find_map(|key| select(entries, key, mode))
            .map(|entry| entry.value.as_words())
            .unwrap_or_default();

        Ok(Self {
            name,
            level,
            file: path.to_path_buf(),
            input_extensions,
            input_extensions_declared,
            output_extensions,
            action,
            files_to_clean: words(FILES_TO_CLEAN),
            target_files,
            dependencies,
        })
    }

    fn action(
        name: &TranslatorName,
        path: &Path,
        entries: &DefinitionEntries,
        mode: GenerationMode,
        default_interpreter: InterpreterKind,
    ) -> Result<TranslatorAction> {
        let command = select(entries, COMMAND_LINE, mode);
        let function = select(entries, TRANSLATOR_FUNCTION, mode);

        match (command, function) {
            (Some(_), Some(_)) => Err(DefinitionError::AmbiguousAction {
                translator: name.to_string(),
                path: path.to_path_buf(),
            }
            .into()),
            (None, None) => Err(DefinitionError::MissingAction {
                translator: name.to_string(),
                path: path.to_path_buf(),
            }
            .into()),
            (Some(command), None) => {
                let arguments = match &command.value {
                    EntryValue::List(items) => items.clone(),
                    EntryValue::Text(text) => {
                        split_command_line(text).map_err(|message| DefinitionError::Malformed {
                            path: path.to_path_buf(),
                            line: command.line,
                            message,
                        })?
                    }
                };
                Ok(TranslatorAction::CommandLine(arguments))
            }
            (None, Some(function)) => {
                let interpreter = match select(entries, TRANSLATOR_INTERPRETER, mode) {
                    Some(entry) => {
                        let requested = entry.value.as_text();
                        requested.parse::<InterpreterKind>().map_err(|_| {
                            DefinitionError::UnknownInterpreter {
                                interpreter: requested.trim().to_string(),
                                path: path.to_path_buf(),
                                available: InterpreterKind::available_names(),
                            }
                        })?
                    }
                    None => default_interpreter,
                };
                Ok(TranslatorAction::Script {
                    interpreter,
                    body: function.value.as_text(),
                })
            }
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self.action, TranslatorAction::Script { .. })
    }

    /// Backend of a script translator
    pub fn interpreter(&self) -> Option<InterpreterKind> {
        match &self.action {
            TranslatorAction::Script { interpreter, .. } => Some(*interpreter),
            TranslatorAction::CommandLine(_) => None,
        }
    }

    /// Longest input extension ending `file_name`, compared case-insensitively
    pub fn matching_extension(&self, file_name: &str) -> Option<&str> {
        let lower = file_name.to_lowercase();
        self.input_extensions
            .iter()
            .filter(|ext| lower.len() > ext.len() && lower.ends_with(ext.as_str()))
            .max_by_key(|ext| ext.len())
            .map(String::as_str)
    }

    /// Preferred output extension of the active mode
    pub fn output_extension(&self) -> &str {
        self.output_extensions
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Entry for `key`: the active mode's variant wins over the generic one.
///
/// Blank values count as absent.
fn select<'a>(
    entries: &'a DefinitionEntries,
    key: &str,
    mode: GenerationMode,
) -> Option<&'a DefinitionEntry> {
    let specific = mode
        .entry_names()
        .into_iter()
        .find_map(|name| entries.get(&DefinitionEntry::canonical_key(key, Some(name))));
    specific
        .or_else(|| entries.get(key))
        .filter(|entry| !entry.value.as_text().trim().is_empty())
}

fn normalize_extensions(value: &EntryValue) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for word in value.as_words() {
        let word = word.trim_matches(|c: char| c == ',' || c.is_whitespace());
        if word.is_empty() {
            continue;
        }
        let ext = if word.starts_with('.') {
            word.to_lowercase()
        } else {
            format!(".{}", word.to_lowercase())
        };
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    extensions
}

/// Split a command line into arguments.
///
/// Whitespace separates arguments; single quotes keep their content verbatim,
/// double quotes honour backslash escapes, and a backslash outside quotes
/// escapes the next character. `$var` references are kept for later expansion.
pub fn split_command_line(text: &str) -> std::result::Result<Vec<String>, String> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut in_argument = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_argument = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                in_argument = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return Err("unterminated double quote".to_string()),
                        },
                        Some(inner) => current.push(inner),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            '\\' => {
                in_argument = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() => {
                if in_argument {
                    arguments.push(std::mem::take(&mut current));
                    in_argument = false;
                }
            }
            c => {
                in_argument = true;
                current.push(c);
            }
        }
    }
    if in_argument {
        arguments.push(current);
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(name: &str, content: &str, mode: GenerationMode) -> Result<TranslatorDefinition> {
        TranslatorDefinition::load(
            name,
            DefinitionFormat::Line,
            Path::new("/defs/def.transdef1"),
            content,
            TranslatorLevel::System,
            mode,
        )
    }

    #[test]
    fn test_command_line_definition() {
        let definition = load(
            "svg2pdf",
            "INPUT_EXTENSIONS = .svg SVGZ\nOUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = inkscape --export-filename=\"$out\" '$in'\n",
            GenerationMode::Pdf,
        )
        .unwrap();

        assert_eq!(definition.input_extensions, vec![".svg", ".svgz"]);
        assert!(definition.input_extensions_declared);
        assert_eq!(definition.output_extension(), ".pdf");
        assert_eq!(
            definition.action,
            TranslatorAction::CommandLine(vec![
                "inkscape".to_string(),
                "--export-filename=$out".to_string(),
                "$in".to_string(),
            ])
        );
        assert_eq!(definition.target_files, vec!["$out"]);
        assert!(!definition.is_script());
    }

    #[test]
    fn test_mode_specific_entries_win() {
        let content = "\
INPUT_EXTENSIONS = .dot
OUTPUT_EXTENSIONS = .pdf
OUTPUT_EXTENSIONS for eps = .eps
COMMAND_LINE for pdf = dot -Tpdf -o $out $in
COMMAND_LINE for eps = dot -Tps -o $out $in
";
        let pdf = load("dot2pdf", content, GenerationMode::Pdf).unwrap();
        let eps = load("dot2pdf", content, GenerationMode::Eps).unwrap();

        assert_eq!(pdf.output_extensions, vec![".pdf"]);
        assert_eq!(eps.output_extensions, vec![".eps"]);
        match eps.action {
            TranslatorAction::CommandLine(args) => assert_eq!(args[1], "-Tps"),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_script_uses_reader_default_interpreter() {
        let content = "\
INPUT_EXTENSIONS = .fig
OUTPUT_EXTENSIONS = .pdf
FILES_TO_CLEAN = $outwoext.log
TRANSLATOR_FUNCTION = <<END
system('fig2dev', '-L', 'pdf', $in, $out);
END
";
        let definition = load("fig2pdf", content, GenerationMode::Pdf).unwrap();
        assert_eq!(definition.interpreter(), Some(InterpreterKind::Perl));
        assert_eq!(definition.files_to_clean, vec!["$outwoext.log"]);
    }

    #[test]
    fn test_explicit_interpreter_and_dependencies() {
        let content = "\
OUTPUT_EXTENSIONS = .png
TRANSLATOR_INTERPRETER = sh
TRANSLATOR_PERL_DEPENDENCIES = File::Copy
TRANSLATOR_FUNCTION = cp \"$in\" \"$out\"
";
        let definition = load("jpg2png", content, GenerationMode::Pdf).unwrap();
        assert_eq!(definition.interpreter(), Some(InterpreterKind::Shell));
        assert_eq!(definition.dependencies, vec!["File::Copy"]);
        // Inputs default to the source type
        assert_eq!(definition.input_extensions, vec![".jpg"]);
        assert!(!definition.input_extensions_declared);
    }

    #[test]
    fn test_action_must_be_unique() {
        let both = "OUTPUT_EXTENSIONS = .b\nCOMMAND_LINE = x\nTRANSLATOR_FUNCTION = y\n";
        let err = load("a2b", both, GenerationMode::Pdf).unwrap_err();
        assert!(err.to_string().contains("both"));

        let neither = "OUTPUT_EXTENSIONS = .b\n";
        let err = load("a2b", neither, GenerationMode::Pdf).unwrap_err();
        assert!(err.to_string().contains("neither"));
    }

    #[test]
    fn test_unknown_interpreter_is_rejected() {
        let content = "OUTPUT_EXTENSIONS = .b\nTRANSLATOR_INTERPRETER = tcl\nTRANSLATOR_FUNCTION = x\n";
        let err = load("a2b", content, GenerationMode::Pdf).unwrap_err();
        assert!(err.to_string().contains("tcl"));
    }

    #[test]
    fn test_missing_output_extension_for_mode() {
        let content = "OUTPUT_EXTENSIONS for eps = .eps\nCOMMAND_LINE = x\n";
        let err = load("a2eps", content, GenerationMode::Pdf).unwrap_err();
        assert!(err.to_string().contains("pdf mode"));
    }

    #[test]
    fn test_longest_extension_matches() {
        let content = "INPUT_EXTENSIONS = .svg .svg+tex\nOUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = x\n";
        let definition = load("svg2pdf+tex", content, GenerationMode::Pdf).unwrap();
        assert_eq!(definition.matching_extension("Figure.SVG+TEX"), Some(".svg+tex"));
        assert_eq!(definition.matching_extension("figure.svg"), Some(".svg"));
        assert_eq!(definition.matching_extension(".svg"), None);
        assert_eq!(definition.matching_extension("figure.png"), None);
    }

    #[test]
    fn test_split_command_line() {
        assert_eq!(
            split_command_line(r#"convert "a b.png" 'c $d' e\ f"#).unwrap(),
            vec!["convert", "a b.png", "c $d", "e f"]
        );
        assert_eq!(split_command_line("x ''").unwrap(), vec!["x", ""]);
        assert!(split_command_line("x 'open").is_err());
    }

    #[test]
    fn test_generation_mode_spellings() {
        assert_eq!("vector".parse::<GenerationMode>().unwrap(), GenerationMode::Pdf);
        assert_eq!("RASTER".parse::<GenerationMode>().unwrap(), GenerationMode::Eps);
        assert!("png".parse::<GenerationMode>().is_err());
        let mode: GenerationMode = serde_yaml::from_str("raster").unwrap();
        assert_eq!(mode, GenerationMode::Eps);
    }
}
