// Translator listing

use serde::Serialize;

use crate::error::{exit_codes, Result, TransError};
use crate::level::TranslatorLevel;
use crate::repository::TranslatorRepository;

/// One row of `autotrans list`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatorEntry {
    pub name: String,
    pub source: String,
    pub target: String,
    /// Highest level the translator is installed at
    pub installed_at: TranslatorLevel,
    /// Level the inclusion decision comes from, when included
    pub included_at: Option<TranslatorLevel>,
    pub interpreter: Option<String>,
}

pub fn entries(repository: &TranslatorRepository, all: bool) -> Vec<TranslatorEntry> {
    let included = repository.get_included_translators_with_levels();
    let mut rows = Vec::new();

    for (name, definition) in repository.installed_translators() {
        let included_at = included.get(&name).copied();
        if !all && included_at.is_none() {
            continue;
        }
        let installed_at = TranslatorLevel::INSTALLABLE
            .into_iter()
            .rev()
            .find(|level| repository.installed_translators_at(*level).contains_key(&name))
            .unwrap_or(definition.level);
        rows.push(TranslatorEntry {
            source: definition.name.full_source().to_string(),
            target: definition.name.target(),
            interpreter: definition.interpreter().map(|kind| kind.name().to_string()),
            name,
            installed_at,
            included_at,
        });
    }
    rows
}

pub fn execute(repository: &TranslatorRepository, json: bool, all: bool) -> Result<i32> {
    let rows = entries(repository, all);

    if json {
        let rendered = serde_json::to_string_pretty(&rows)
            .map_err(|e| TransError::Io(std::io::Error::other(e)))?;
        println!("{rendered}");
        return Ok(exit_codes::SUCCESS);
    }

    if rows.is_empty() {
        println!("No translators found");
        return Ok(exit_codes::SUCCESS);
    }

    let width = rows.iter().map(|row| row.name.len()).max().unwrap_or(0);
    for row in &rows {
        let included = match row.included_at {
            Some(level) => format!("included ({level})"),
            None => "excluded".to_string(),
        };
        let interpreter = row.interpreter.as_deref().unwrap_or("command");
        println!(
            "{:<width$}  {:<8}  {:<16}  {}",
            row.name, row.installed_at, included, interpreter
        );
    }
    Ok(exit_codes::SUCCESS)
}
