// Translator definition file readers
//
// Two on-disk formats share one contract: the line-oriented format
// (`KEY [for MODE] = value` with `<<MARK` blocks) and a YAML mapping.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DefinitionError, Result};
use crate::interpreter::InterpreterKind;

/// Extension of translator definition files, optionally followed by a format version
pub const DEFINITION_EXTENSION: &str = "transdef";

static FILE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.+)\.transdef(?P<version>[0-9]*)$").expect("file name pattern is valid")
});

static ENTRY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<key>[A-Za-z_][A-Za-z0-9_]*)(?:\s+for\s+(?P<mode>[A-Za-z0-9]+))?\s*=\s*(?P<value>.*?)\s*$",
    )
    .expect("entry pattern is valid")
});

static BLOCK_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<<\s*(?P<marker>[A-Za-z0-9_]+)$").expect("block pattern is valid"));

/// Raw value of a definition entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    Text(String),
    List(Vec<String>),
}

impl EntryValue {
    /// The value as one string; list items are joined with spaces
    pub fn as_text(&self) -> String {
        match self {
            EntryValue::Text(text) => text.clone(),
            EntryValue::List(items) => items.join(" "),
        }
    }

    /// The value as whitespace-separated words
    pub fn as_words(&self) -> Vec<String> {
        match self {
            EntryValue::Text(text) => text.split_whitespace().map(str::to_string).collect(),
            EntryValue::List(items) => items.clone(),
        }
    }
}

/// One `KEY [for MODE] = value` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionEntry {
    /// Upper-cased key
    pub key: String,
    /// Lower-cased generation mode the entry is restricted to
    pub mode: Option<String>,
    pub value: EntryValue,
    /// 1-based line of the entry, 0 when the format has no line information
    pub line: usize,
}

impl DefinitionEntry {
    /// Map key of an entry: `KEY` or `KEY for mode`
    pub fn canonical_key(key: &str, mode: Option<&str>) -> String {
        match mode {
            Some(mode) => format!("{} for {}", key.to_ascii_uppercase(), mode.to_ascii_lowercase()),
            None => key.to_ascii_uppercase(),
        }
    }
}

pub type DefinitionEntries = BTreeMap<String, DefinitionEntry>;

/// Reader contract shared by every definition file format
pub trait DefinitionReader: Send + Sync {
    fn format_name(&self) -> &'static str;

    /// Interpreter assumed when a script does not name one
    fn default_interpreter(&self) -> InterpreterKind;

    fn read_translator_file(&self, path: &Path, content: &str) -> Result<DefinitionEntries>;
}

/// On-disk format selected by the version digits of the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    /// `.transdef` / `.transdef0`: line-oriented, loaded only when legacy support is on
    Legacy,
    /// `.transdef1`: line-oriented
    Line,
    /// `.transdef2`: YAML mapping
    Structured,
}

impl DefinitionFormat {
    pub fn from_version(version: Option<u32>) -> Option<Self> {
        match version {
            None | Some(0) => Some(DefinitionFormat::Legacy),
            Some(1) => Some(DefinitionFormat::Line),
            Some(2) => Some(DefinitionFormat::Structured),
            Some(_) => None,
        }
    }

    pub fn reader(self) -> &'static dyn DefinitionReader {
        static LINE: LineDefinitionReader = LineDefinitionReader;
        static YAML: YamlDefinitionReader = YamlDefinitionReader;
        match self {
            DefinitionFormat::Legacy | DefinitionFormat::Line => &LINE,
            DefinitionFormat::Structured => &YAML,
        }
    }
}

/// Split a definition file name into translator name and format version
pub fn parse_definition_file_name(file_name: &str) -> Option<(String, Option<u32>)> {
    let captures = FILE_NAME_PATTERN.captures(file_name)?;
    let name = captures["name"].to_string();
    let version = match &captures["version"] {
        "" => None,
        digits => Some(digits.parse().ok()?),
    };
    Some((name, version))
}

/// Reader for the line-oriented format
#[derive(Debug, Default, Clone, Copy)]
pub struct LineDefinitionReader;

impl DefinitionReader for LineDefinitionReader {
    fn format_name(&self) -> &'static str {
        "line"
    }

    fn default_interpreter(&self) -> InterpreterKind {
        InterpreterKind::Perl
    }

    fn read_translator_file(&self, path: &Path, content: &str) -> Result<DefinitionEntries> {
        let mut entries = DefinitionEntries::new();
        let mut lines = content.lines().enumerate();

        while let Some((index, line)) = lines.next() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let captures = ENTRY_PATTERN.captures(line).ok_or_else(|| {
                DefinitionError::Malformed {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: format!("expected 'KEY = value', found '{trimmed}'"),
                }
            })?;

            let key = captures["key"].to_ascii_uppercase();
            let mode = captures.name("mode").map(|m| m.as_str().to_ascii_lowercase());
            let raw_value = &captures["value"];

            let value = match BLOCK_START.captures(raw_value) {
                Some(block) => {
                    let marker = block["marker"].to_string();
                    let mut body = Vec::new();
                    let mut closed = false;
                    for (_, block_line) in lines.by_ref() {
                        if block_line.trim() == marker {
                            closed = true;
                            break;
                        }
                        body.push(block_line);
                    }
                    if !closed {
                        return Err(DefinitionError::UnterminatedBlock {
                            path: path.to_path_buf(),
                            line: index + 1,
                            marker,
                        }
                        .into());
                    }
                    let mut text = body.join("\n");
                    text.push('\n');
                    EntryValue::Text(text)
                }
                None => EntryValue::Text(raw_value.to_string()),
            };

            let canonical = DefinitionEntry::canonical_key(&key, mode.as_deref());
            entries.insert(
                canonical,
                DefinitionEntry {
                    key,
                    mode,
                    value,
                    line: index + 1,
                },
            );
        }

        Ok(entries)
    }
}

/// Reader for the YAML format
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlDefinitionReader;

impl YamlDefinitionReader {
    fn scalar(value: &serde_yaml::Value) -> Option<String> {
        match value {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn entry_value(path: &Path, key: &str, value: &serde_yaml::Value) -> Result<EntryValue> {
        if let Some(text) = Self::scalar(value) {
            return Ok(EntryValue::Text(text));
        }
        if let serde_yaml::Value::Sequence(items) = value {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                list.push(Self::scalar(item).ok_or_else(|| DefinitionError::Malformed {
                    path: path.to_path_buf(),
                    line: 0,
                    message: format!("list items of {key} must be scalars"),
                })?);
            }
            return Ok(EntryValue::List(list));
        }
        Err(DefinitionError::Malformed {
            path: path.to_path_buf(),
            line: 0,
            message: format!("unsupported value for {key}"),
        }
        .into())
    }
}

impl DefinitionReader for YamlDefinitionReader {
    fn format_name(&self) -> &'static str {
        "yaml"
    }

    fn default_interpreter(&self) -> InterpreterKind {
        InterpreterKind::Python
    }

    fn read_translator_file(&self, path: &Path, content: &str) -> Result<DefinitionEntries> {
        let document: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| DefinitionError::Malformed {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()).unwrap_or(0),
                message: e.to_string(),
            })?;

        let mapping = match document {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => return Ok(DefinitionEntries::new()),
            _ => {
                return Err(DefinitionError::Malformed {
                    path: path.to_path_buf(),
                    line: 0,
                    message: "top-level value must be a mapping".to_string(),
                }
                .into())
            }
        };

        let mut entries = DefinitionEntries::new();
        for (raw_key, value) in &mapping {
            let key = Self::scalar(raw_key)
                .ok_or_else(|| DefinitionError::Malformed {
                    path: path.to_path_buf(),
                    line: 0,
                    message: "keys must be strings".to_string(),
                })?
                .to_ascii_uppercase();

            match value {
                serde_yaml::Value::Null => continue,
                serde_yaml::Value::Mapping(per_mode) => {
                    for (raw_mode, mode_value) in per_mode {
                        let mode = Self::scalar(raw_mode)
                            .ok_or_else(|| DefinitionError::Malformed {
                                path: path.to_path_buf(),
                                line: 0,
                                message: format!("mode names of {key} must be strings"),
                            })?
                            .to_ascii_lowercase();
                        let value = Self::entry_value(path, &key, mode_value)?;
                        entries.insert(
                            DefinitionEntry::canonical_key(&key, Some(&mode)),
                            DefinitionEntry {
                                key: key.clone(),
                                mode: Some(mode),
                                value,
                                line: 0,
                            },
                        );
                    }
                }
                other => {
                    let value = Self::entry_value(path, &key, other)?;
                    entries.insert(
                        DefinitionEntry::canonical_key(&key, None),
                        DefinitionEntry {
                            key: key.clone(),
                            mode: None,
                            value,
                            line: 0,
                        },
                    );
                }
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_grammar() {
        assert_eq!(
            parse_definition_file_name("svg2pdf.transdef"),
            Some(("svg2pdf".to_string(), None))
        );
        assert_eq!(
            parse_definition_file_name("svg2pdf+tex_cairo.transdef2"),
            Some(("svg2pdf+tex_cairo".to_string(), Some(2)))
        );
        assert_eq!(parse_definition_file_name("svg2pdf.cfg"), None);
        assert_eq!(parse_definition_file_name("svg2pdf.transdef.bak"), None);
    }

    #[test]
    fn test_format_from_version() {
        assert_eq!(DefinitionFormat::from_version(None), Some(DefinitionFormat::Legacy));
        assert_eq!(DefinitionFormat::from_version(Some(0)), Some(DefinitionFormat::Legacy));
        assert_eq!(DefinitionFormat::from_version(Some(1)), Some(DefinitionFormat::Line));
        assert_eq!(DefinitionFormat::from_version(Some(2)), Some(DefinitionFormat::Structured));
        assert_eq!(DefinitionFormat::from_version(Some(9)), None);
    }

    #[test]
    fn test_line_reader_entries_and_blocks() {
        let content = "\
# Inkscape based conversion
INPUT_EXTENSIONS = .svg .svgz
OUTPUT_EXTENSIONS for pdf = .pdf
output_extensions for EPS = .eps
TRANSLATOR_FUNCTION = <<EOL
print \"$in\\n\";
  exit 0;
EOL
FILES_TO_CLEAN = $out.bak
";
        let entries = LineDefinitionReader
            .read_translator_file(Path::new("svg2pdf.transdef1"), content)
            .unwrap();

        assert_eq!(
            entries["INPUT_EXTENSIONS"].value.as_words(),
            vec![".svg", ".svgz"]
        );
        assert_eq!(entries["OUTPUT_EXTENSIONS for eps"].mode.as_deref(), Some("eps"));
        assert_eq!(entries["OUTPUT_EXTENSIONS for pdf"].line, 3);
        assert_eq!(
            entries["TRANSLATOR_FUNCTION"].value.as_text(),
            "print \"$in\\n\";\n  exit 0;\n"
        );
        assert_eq!(entries["FILES_TO_CLEAN"].value.as_text(), "$out.bak");
    }

    #[test]
    fn test_line_reader_rejects_garbage() {
        let err = LineDefinitionReader
            .read_translator_file(Path::new("x2y.transdef1"), "INPUT_EXTENSIONS = .x\nnot an entry\n")
            .unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }

    #[test]
    fn test_line_reader_unterminated_block() {
        let err = LineDefinitionReader
            .read_translator_file(Path::new("x2y.transdef1"), "TRANSLATOR_FUNCTION = <<END\necho\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unterminated block 'END'"));
    }

    #[test]
    fn test_yaml_reader_modes_and_lists() {
        let content = r#"
INPUT_EXTENSIONS: [.dot]
OUTPUT_EXTENSIONS:
  pdf: .pdf
  eps: .eps
COMMAND_LINE:
  pdf: [dot, -Tpdf, -o, $out, $in]
TRANSLATOR_DEPENDENCIES: ~
"#;
        let entries = YamlDefinitionReader
            .read_translator_file(Path::new("dot2pdf.transdef2"), content)
            .unwrap();

        assert_eq!(
            entries["INPUT_EXTENSIONS"].value,
            EntryValue::List(vec![".dot".to_string()])
        );
        assert_eq!(entries["OUTPUT_EXTENSIONS for eps"].value.as_text(), ".eps");
        assert_eq!(
            entries["COMMAND_LINE for pdf"].value.as_words(),
            vec!["dot", "-Tpdf", "-o", "$out", "$in"]
        );
        assert!(!entries.contains_key("TRANSLATOR_DEPENDENCIES"));
    }

    #[test]
    fn test_yaml_reader_rejects_non_mapping() {
        let result =
            YamlDefinitionReader.read_translator_file(Path::new("a2b.transdef2"), "- just\n- a list\n");
        assert!(result.is_err());
    }
}
