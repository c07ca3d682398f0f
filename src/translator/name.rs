// Translator name parsing: <source>2<target>[+<modifier>...][_<variant>]

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<source>[A-Za-z][A-Za-z0-9+\-]*?)2(?P<target>[A-Za-z0-9\-]+)(?:\+(?P<mods>[A-Za-z0-9+\-]+))?(?:_(?P<variant>.*))?$",
    )
    .expect("translator name pattern is valid")
});

/// Target modifier marking a translator that produces TeX-embedded text
pub const TEX_MODIFIER: &str = "tex";
/// Target modifier marking a translator that produces layered output
pub const LAYERS_MODIFIER: &str = "layers";

/// Parsed view of a translator name.
///
/// All parts are derived once at construction; the value never changes afterwards.
#[derive(Debug, Clone)]
pub struct TranslatorName {
    name: String,
    source: String,
    target_base: String,
    modifiers: Vec<String>,
    variante: String,
    full_source: String,
    basename: String,
}

impl TranslatorName {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();

        let Some(captures) = NAME_PATTERN.captures(&name) else {
            return Self {
                source: name.clone(),
                target_base: String::new(),
                modifiers: Vec::new(),
                variante: String::new(),
                full_source: name.clone(),
                basename: name.clone(),
                name,
            };
        };

        let source = captures["source"].to_string();
        let target_base = captures["target"].to_string();
        let modifiers: Vec<String> = captures
            .name("mods")
            .map(|m| {
                m.as_str()
                    .split('+')
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let variante = captures
            .name("variant")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let mut full_source = source.clone();
        if modifiers.iter().any(|m| m == TEX_MODIFIER) {
            full_source = format!("ltx.{full_source}");
        }
        if modifiers.iter().any(|m| m == LAYERS_MODIFIER) {
            full_source = format!("layers.{full_source}");
        }

        let basename = match captures.name("variant") {
            // The variant group starts right after its '_' separator
            Some(variant) => name[..variant.start() - 1].to_string(),
            None => name.clone(),
        };

        Self {
            name,
            source,
            target_base,
            modifiers,
            variante,
            full_source,
            basename,
        }
    }

    /// Raw name as written in the definition file name
    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Target type including its `+modifier` suffix, empty for malformed names
    pub fn target(&self) -> String {
        if self.modifiers.is_empty() {
            self.target_base.clone()
        } else {
            format!("{}+{}", self.target_base, self.modifiers.join("+"))
        }
    }

    /// Target type without modifiers
    pub fn target_base(&self) -> &str {
        &self.target_base
    }

    pub fn target_modifiers(&self) -> &[String] {
        &self.modifiers
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    pub fn variante(&self) -> &str {
        &self.variante
    }

    /// Conflict-grouping key: the source qualified by the `tex`/`layers` modifiers
    pub fn full_source(&self) -> &str {
        &self.full_source
    }

    /// The name without its variant suffix
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Whether the name follows the `<source>2<target>` grammar
    pub fn is_well_formed(&self) -> bool {
        !self.target_base.is_empty()
    }
}

impl PartialEq for TranslatorName {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TranslatorName {}

impl std::hash::Hash for TranslatorName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for TranslatorName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TranslatorName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl FromStr for TranslatorName {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(TranslatorName::new(s))
    }
}

impl From<&str> for TranslatorName {
    fn from(value: &str) -> Self {
        TranslatorName::new(value)
    }
}

impl fmt::Display for TranslatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for TranslatorName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for TranslatorName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TranslatorName::new(raw))
    }
}
