// Translator precedence levels
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, Result};

/// Precedence level of a translator installation or inclusion decision.
///
/// The variant order is the precedence order: `Never < System < User < Document`.
/// `Never` is a sentinel meaning "excluded everywhere" and never addresses a slot
/// of a per-level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorLevel {
    Never,
    System,
    User,
    Document,
}

impl TranslatorLevel {
    /// Levels that own a slot in per-level tables, lowest precedence first
    pub const INSTALLABLE: [TranslatorLevel; 3] = [
        TranslatorLevel::System,
        TranslatorLevel::User,
        TranslatorLevel::Document,
    ];

    /// Table slot of this level, `None` for the `Never` sentinel
    pub fn index(self) -> Option<usize> {
        match self {
            TranslatorLevel::Never => None,
            TranslatorLevel::System => Some(0),
            TranslatorLevel::User => Some(1),
            TranslatorLevel::Document => Some(2),
        }
    }

    /// Slot index that rejects the sentinel, for mutating operations
    pub(crate) fn slot(self, operation: &str) -> Result<usize> {
        self.index().ok_or_else(|| {
            ConfigError::InvalidLevel {
                level: self.to_string(),
                operation: operation.to_string(),
            }
            .into()
        })
    }

    /// This level and every installable level below it, highest first
    pub fn at_or_below(self) -> impl Iterator<Item = TranslatorLevel> {
        TranslatorLevel::INSTALLABLE
            .into_iter()
            .rev()
            .filter(move |level| *level <= self)
    }

    /// Legacy numeric conversion: out-of-range values are clamped instead of rejected.
    ///
    /// `-1` (or anything lower) maps to `Never`, values above `2` to `Document`.
    pub fn clamp(value: i64) -> Self {
        let level = match value {
            i64::MIN..=-1 => TranslatorLevel::Never,
            0 => TranslatorLevel::System,
            1 => TranslatorLevel::User,
            _ => TranslatorLevel::Document,
        };
        if !(-1..=2).contains(&value) {
            tracing::warn!(value, level = %level, "Clamped out-of-range translator level");
        }
        level
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TranslatorLevel::Never => "never",
            TranslatorLevel::System => "system",
            TranslatorLevel::User => "user",
            TranslatorLevel::Document => "document",
        }
    }
}

impl TryFrom<i64> for TranslatorLevel {
    type Error = crate::error::TransError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(TranslatorLevel::Never),
            0 => Ok(TranslatorLevel::System),
            1 => Ok(TranslatorLevel::User),
            2 => Ok(TranslatorLevel::Document),
            other => Err(ConfigError::InvalidLevel {
                level: other.to_string(),
                operation: "numeric level conversion".to_string(),
            }
            .into()),
        }
    }
}

impl FromStr for TranslatorLevel {
    type Err = crate::error::TransError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(TranslatorLevel::Never),
            "system" => Ok(TranslatorLevel::System),
            "user" => Ok(TranslatorLevel::User),
            "document" | "project" => Ok(TranslatorLevel::Document),
            other => match other.parse::<i64>() {
                Ok(number) => Ok(TranslatorLevel::clamp(number)),
                Err(_) => Err(ConfigError::InvalidLevel {
                    level: s.to_string(),
                    operation: "level parsing".to_string(),
                }
                .into()),
            },
        }
    }
}

impl fmt::Display for TranslatorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
