// Per-level translator inclusion decisions

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::level::TranslatorLevel;

/// Explicit include/exclude decisions, one table per installable level.
///
/// A missing entry means "no decision": queries with inheritance then fall back
/// to the next lower level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslatorConfig {
    levels: [BTreeMap<String, bool>; 3],
}

impl TranslatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (`Some`) or clear (`None`) the decision for `name` at exactly `level`
    pub fn set_included(
        &mut self,
        name: &str,
        level: TranslatorLevel,
        included: Option<bool>,
    ) -> Result<()> {
        let slot = level.slot("set_included")?;
        match included {
            Some(value) => {
                tracing::trace!(translator = name, level = %level, included = value, "Recording inclusion decision");
                self.levels[slot].insert(name.to_string(), value);
            }
            None => {
                self.levels[slot].remove(name);
            }
        }
        Ok(())
    }

    /// Decision for `name` at `level`.
    ///
    /// With `inherit`, levels are walked from `level` down to `System` and the first
    /// decision found is returned. `Never` has nothing at or below it.
    pub fn included(&self, name: &str, level: TranslatorLevel, inherit: bool) -> Option<bool> {
        if inherit {
            level
                .at_or_below()
                .find_map(|lower| self.decision(name, lower))
        } else {
            self.decision(name, level)
        }
    }

    /// Level from which `name` is effectively included.
    ///
    /// Scanning from `Document` down, the first decision wins: an inclusion yields its
    /// level, an exclusion yields `Never`. `None` when no level decides.
    pub fn inclusion_level(&self, name: &str) -> Option<TranslatorLevel> {
        TranslatorLevel::Document
            .at_or_below()
            .find_map(|level| {
                self.decision(name, level).map(|included| {
                    if included {
                        level
                    } else {
                        TranslatorLevel::Never
                    }
                })
            })
    }

    /// Highest-level decision of every translator with any decision
    pub fn translators(&self) -> BTreeMap<String, bool> {
        let mut merged = BTreeMap::new();
        for level in TranslatorLevel::INSTALLABLE {
            if let Some(slot) = level.index() {
                for (name, included) in &self.levels[slot] {
                    merged.insert(name.clone(), *included);
                }
            }
        }
        merged
    }

    /// Explicit decisions made at exactly `level`
    pub fn decisions_at(&self, level: TranslatorLevel) -> Option<&BTreeMap<String, bool>> {
        level.index().map(|slot| &self.levels[slot])
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(BTreeMap::is_empty)
    }

    fn decision(&self, name: &str, level: TranslatorLevel) -> Option<bool> {
        level
            .index()
            .and_then(|slot| self.levels[slot].get(name).copied())
    }
}
