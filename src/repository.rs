// Translator discovery and selection across the SYSTEM, USER and DOCUMENT levels

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::{ConflictError, Result, TransError, TranslatorConflict};
use crate::filesystem::{DirectoryLister, OsDirectoryLister};
use crate::inclusion::TranslatorConfig;
use crate::level::TranslatorLevel;
use crate::logging::utils;
use crate::translator::{parse_definition_file_name, DefinitionFormat, TranslatorDefinition};

type LevelMap = BTreeMap<String, Arc<TranslatorDefinition>>;

/// Result of a successful synchronization
#[derive(Debug, Default)]
struct Snapshot {
    installed: [LevelMap; 3],
    effective: TranslatorConfig,
    included_with_levels: BTreeMap<String, TranslatorLevel>,
    by_source: BTreeMap<String, Arc<TranslatorDefinition>>,
}

/// Installed translators and the winner for each source type.
///
/// Starts unsynchronized; every accessor but [`TranslatorRepository::sync`] then
/// returns empty results.
pub struct TranslatorRepository {
    config: Arc<Config>,
    translator_config: TranslatorConfig,
    lister: Arc<dyn DirectoryLister>,
    snapshot: Option<Snapshot>,
}

impl TranslatorRepository {
    /// Repository over the real file system with the decisions of `config`
    pub fn new(config: Arc<Config>) -> Result<Self> {
        Self::with_lister(config, Arc::new(OsDirectoryLister))
    }

    pub fn with_lister(config: Arc<Config>, lister: Arc<dyn DirectoryLister>) -> Result<Self> {
        let translator_config = config.translator_config()?;
        Ok(Self {
            config,
            translator_config,
            lister,
            snapshot: None,
        })
    }

    /// Replace the explicit inclusion decisions; takes effect on the next sync
    pub fn with_translator_config(mut self, translator_config: TranslatorConfig) -> Self {
        self.translator_config = translator_config;
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn lister(&self) -> &Arc<dyn DirectoryLister> {
        &self.lister
    }

    /// Explicit decisions supplied by the caller
    pub fn translator_config(&self) -> &TranslatorConfig {
        &self.translator_config
    }

    /// Mutable access to the explicit decisions; call [`TranslatorRepository::sync`] afterwards
    pub fn translator_config_mut(&mut self) -> &mut TranslatorConfig {
        &mut self.translator_config
    }

    /// Explicit decisions merged with install-level defaults, once synced
    pub fn effective_config(&self) -> Option<&TranslatorConfig> {
        self.snapshot.as_ref().map(|snapshot| &snapshot.effective)
    }

    pub fn is_synced(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Rebuild the repository from disk.
    ///
    /// On error the repository is left unsynchronized and empty.
    pub fn sync(&mut self, detect_conflicts: bool) -> Result<()> {
        let span = utils::sync_span(detect_conflicts);
        let _guard = span.enter();
        let started = Instant::now();

        self.snapshot = None;

        let installed = self.scan_all();
        let effective = self.merge_inclusions(&installed)?;
        if detect_conflicts {
            self.detect_conflicts(&installed, &effective)?;
        }
        let included_with_levels = Self::included_levels(&installed, &effective);
        let by_source = Self::dispatch_map(&installed, &included_with_levels);

        let snapshot = Snapshot {
            installed,
            effective,
            included_with_levels,
            by_source,
        };
        utils::log_sync_completion(
            Self::merged(&snapshot.installed).len(),
            snapshot.included_with_levels.len(),
            started.elapsed().as_millis(),
        );
        self.snapshot = Some(snapshot);
        Ok(())
    }

    fn scan_all(&self) -> [LevelMap; 3] {
        let mut installed: [LevelMap; 3] = Default::default();
        for level in TranslatorLevel::INSTALLABLE {
            let Some(slot) = level.index() else { continue };
            if self.config.is_level_ignored(level) {
                tracing::debug!(level = %level, "Skipping ignored translator level");
                continue;
            }
            for (directory, recursive) in self.config.level_directories(level) {
                self.scan_directory(level, &directory, recursive, &mut installed[slot]);
            }
        }
        installed
    }

    fn scan_directory(
        &self,
        level: TranslatorLevel,
        directory: &Path,
        recursive: bool,
        into: &mut LevelMap,
    ) {
        let span = utils::scan_span(level, directory);
        let _guard = span.enter();

        let files = match self.lister.list_files(directory, recursive) {
            Ok(files) => files,
            Err(TransError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(directory = %directory.display(), "Translator directory does not exist");
                return;
            }
            Err(e) => {
                tracing::warn!(directory = %directory.display(), error = %e, "Cannot read translator directory");
                return;
            }
        };

        for path in files {
            if let Some(definition) = self.load_definition(level, &path) {
                let name = definition.name.to_string();
                if let Some(previous) = into.insert(name.clone(), Arc::new(definition)) {
                    tracing::debug!(
                        translator = %name,
                        shadowed = %previous.file.display(),
                        level = %level,
                        "Translator redefined at the same level"
                    );
                }
            }
        }
    }

    fn load_definition(&self, level: TranslatorLevel, path: &Path) -> Option<TranslatorDefinition> {
        let file_name = path.file_name()?.to_str()?;
        let (name, version) = parse_definition_file_name(file_name)?;

        let Some(format) = DefinitionFormat::from_version(version) else {
            tracing::warn!(file = %path.display(), version = ?version, "Unsupported translator definition version");
            return None;
        };
        if format == DefinitionFormat::Legacy && !self.config.legacy_definitions {
            tracing::debug!(file = %path.display(), "Skipping legacy translator definition");
            return None;
        }
        if !crate::translator::TranslatorName::new(name.as_str()).is_well_formed() {
            tracing::warn!(file = %path.display(), "Translator name does not follow <source>2<target>");
            return None;
        }

        let content = match self.lister.read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Cannot read translator definition");
                return None;
            }
        };

        match TranslatorDefinition::load(
            &name,
            format,
            path,
            &content,
            level,
            self.config.generation_mode,
        ) {
            Ok(definition) => {
                tracing::trace!(translator = %name, level = %level, file = %path.display(), "Loaded translator");
                Some(definition)
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Ignoring invalid translator definition");
                None
            }
        }
    }

    /// Installed translators without a decision are included from their install level
    fn merge_inclusions(&self, installed: &[LevelMap; 3]) -> Result<TranslatorConfig> {
        let mut effective = self.translator_config.clone();
        for level in TranslatorLevel::INSTALLABLE {
            let Some(slot) = level.index() else { continue };
            for name in installed[slot].keys() {
                if effective.included(name, level, true).is_none() {
                    effective.set_included(name, level, Some(true))?;
                }
            }
        }
        Ok(effective)
    }

    /// Included translators visible at `level`, grouped by source type
    fn source_groups(
        installed: &[LevelMap; 3],
        effective: &TranslatorConfig,
        level: TranslatorLevel,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for lower in level.at_or_below() {
            let Some(slot) = lower.index() else { continue };
            for (name, definition) in &installed[slot] {
                if effective.included(name, level, true) == Some(true) {
                    groups
                        .entry(definition.name.full_source().to_string())
                        .or_default()
                        .insert(name.clone());
                }
            }
        }
        groups
    }

    fn detect_conflicts(&self, installed: &[LevelMap; 3], effective: &TranslatorConfig) -> Result<()> {
        let active = self.config.active_level();

        for level in TranslatorLevel::INSTALLABLE {
            if level > active {
                break;
            }
            let conflicts: Vec<TranslatorConflict> = Self::source_groups(installed, effective, level)
                .into_iter()
                .filter(|(_, names)| names.len() > 1)
                .map(|(full_source, names)| TranslatorConflict {
                    full_source,
                    translators: names.into_iter().collect(),
                })
                .collect();

            if conflicts.is_empty() {
                continue;
            }
            if level < active {
                for conflict in &conflicts {
                    tracing::debug!(
                        level = %level,
                        source = %conflict.full_source,
                        translators = ?conflict.translators,
                        "Conflict below the active level"
                    );
                }
                continue;
            }

            let snippet = Self::conflict_snippet(level, &conflicts);
            return Err(ConflictError {
                level,
                conflicts,
                snippet,
            }
            .into());
        }
        Ok(())
    }

    /// YAML that keeps the first translator of each group and excludes the others
    fn conflict_snippet(level: TranslatorLevel, conflicts: &[TranslatorConflict]) -> String {
        let mut snippet = format!("translators:\n  {}:\n", level.as_str());
        for conflict in conflicts {
            for name in conflict.translators.iter().skip(1) {
                snippet.push_str(&format!("    {name}: false\n"));
            }
        }
        snippet
    }

    fn included_levels(
        installed: &[LevelMap; 3],
        effective: &TranslatorConfig,
    ) -> BTreeMap<String, TranslatorLevel> {
        Self::merged(installed)
            .into_keys()
            .filter_map(|name| match effective.inclusion_level(&name) {
                Some(level) if level != TranslatorLevel::Never => Some((name, level)),
                _ => None,
            })
            .collect()
    }

    /// Winner per source type: highest inclusion level, then smallest name
    fn dispatch_map(
        installed: &[LevelMap; 3],
        included: &BTreeMap<String, TranslatorLevel>,
    ) -> BTreeMap<String, Arc<TranslatorDefinition>> {
        let merged = Self::merged(installed);
        let mut winners: BTreeMap<String, (TranslatorLevel, Arc<TranslatorDefinition>)> =
            BTreeMap::new();

        // Names iterate in ascending order, so a strictly higher level is needed to replace
        for (name, level) in included {
            let Some(definition) = merged.get(name) else { continue };
            let source = definition.name.full_source().to_string();
            match winners.get(&source) {
                Some((current, _)) if *current >= *level => {}
                _ => {
                    winners.insert(source, (*level, Arc::clone(definition)));
                }
            }
        }
        winners
            .into_iter()
            .map(|(source, (_, definition))| (source, definition))
            .collect()
    }

    /// Every installed translator, taken from its highest installation level
    fn merged(installed: &[LevelMap; 3]) -> LevelMap {
        let mut merged = LevelMap::new();
        for level_map in installed {
            for (name, definition) in level_map {
                merged.insert(name.clone(), Arc::clone(definition));
            }
        }
        merged
    }

    pub fn installed_translators(&self) -> BTreeMap<String, Arc<TranslatorDefinition>> {
        self.snapshot
            .as_ref()
            .map(|snapshot| Self::merged(&snapshot.installed))
            .unwrap_or_default()
    }

    /// Translators installed at exactly `level`
    pub fn installed_translators_at(
        &self,
        level: TranslatorLevel,
    ) -> BTreeMap<String, Arc<TranslatorDefinition>> {
        match (&self.snapshot, level.index()) {
            (Some(snapshot), Some(slot)) => snapshot.installed[slot].clone(),
            _ => BTreeMap::new(),
        }
    }

    /// Included translator names with the level they are included from
    pub fn get_included_translators_with_levels(&self) -> BTreeMap<String, TranslatorLevel> {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.included_with_levels.clone())
            .unwrap_or_default()
    }

    /// Definitions of every included translator
    pub fn included_translators(&self) -> Vec<Arc<TranslatorDefinition>> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };
        let merged = Self::merged(&snapshot.installed);
        snapshot
            .included_with_levels
            .keys()
            .filter_map(|name| merged.get(name).cloned())
            .collect()
    }

    /// The winning translator of every source type
    pub fn winning_translators(&self) -> Vec<Arc<TranslatorDefinition>> {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.by_source.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Installed translator by name, from its highest installation level
    pub fn translator(&self, name: &str) -> Option<Arc<TranslatorDefinition>> {
        let snapshot = self.snapshot.as_ref()?;
        snapshot
            .installed
            .iter()
            .rev()
            .find_map(|level_map| level_map.get(name).cloned())
    }

    /// Winning translator for a source type key such as `svg` or `ltx.svg`
    pub fn translator_for_source(&self, full_source: &str) -> Option<Arc<TranslatorDefinition>> {
        self.snapshot
            .as_ref()?
            .by_source
            .get(full_source)
            .cloned()
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.included_with_levels.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryDirectoryLister;

    const COMMAND: &str = "OUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = convert $in $out\n";

    fn config() -> Config {
        Config::default()
            .with_installation_directory("/sys")
            .with_user_directory("/usr")
    }

    fn repository(config: Config, lister: MemoryDirectoryLister) -> TranslatorRepository {
        TranslatorRepository::with_lister(Arc::new(config), Arc::new(lister)).unwrap()
    }

    #[test]
    fn test_unsynced_repository_is_empty() {
        let repo = repository(config(), MemoryDirectoryLister::new());
        assert!(!repo.is_synced());
        assert!(repo.installed_translators().is_empty());
        assert!(repo.translator_for_source("svg").is_none());
        assert!(repo.effective_config().is_none());
    }

    #[test]
    fn test_sync_loads_levels_and_defaults_inclusion() {
        let lister = MemoryDirectoryLister::new()
            .with_file("/sys/svg2pdf.transdef1", COMMAND)
            .with_file("/sys/nested/dot2pdf.transdef1", COMMAND)
            .with_file("/usr/svg2pdf.transdef1", COMMAND);
        let mut repo = repository(config(), lister);
        repo.sync(true).unwrap();

        assert_eq!(repo.installed_translators().len(), 2);
        assert_eq!(repo.installed_translators_at(TranslatorLevel::System).len(), 2);
        assert_eq!(
            repo.translator("svg2pdf").unwrap().level,
            TranslatorLevel::User
        );
        let levels = repo.get_included_translators_with_levels();
        assert_eq!(levels["dot2pdf"], TranslatorLevel::System);
        assert_eq!(levels["svg2pdf"], TranslatorLevel::System);
        assert!(repo.translator_config().is_empty());
    }

    #[test]
    fn test_invalid_and_unknown_files_are_skipped() {
        let lister = MemoryDirectoryLister::new()
            .with_file("/sys/svg2pdf.transdef1", COMMAND)
            .with_file("/sys/broken2pdf.transdef1", "garbage line\n")
            .with_file("/sys/future2pdf.transdef9", COMMAND)
            .with_file("/sys/old2pdf.transdef", COMMAND)
            .with_file("/sys/readme.txt", "not a definition");
        let mut repo = repository(config(), lister);
        repo.sync(true).unwrap();

        let names: Vec<_> = repo.installed_translators().into_keys().collect();
        assert_eq!(names, vec!["svg2pdf"]);
    }

    #[test]
    fn test_legacy_definitions_when_enabled() {
        let lister = MemoryDirectoryLister::new().with_file("/sys/old2pdf.transdef", COMMAND);
        let mut repo = repository(config().with_legacy_definitions(true), lister);
        repo.sync(false).unwrap();
        assert!(repo.translator("old2pdf").is_some());
    }

    #[test]
    fn test_conflict_snippet_format() {
        let conflicts = vec![TranslatorConflict {
            full_source: "svg".to_string(),
            translators: vec!["svg2pdf".to_string(), "svg2pdf_inkscape".to_string()],
        }];
        assert_eq!(
            TranslatorRepository::conflict_snippet(TranslatorLevel::User, &conflicts),
            "translators:\n  user:\n    svg2pdf_inkscape: false\n"
        );
    }

    #[test]
    fn test_failed_sync_resets_state() {
        let ok = MemoryDirectoryLister::new().with_file("/sys/svg2pdf.transdef1", COMMAND);
        let mut repo = repository(config(), ok);
        repo.sync(true).unwrap();
        assert!(repo.is_synced());

        let conflicting = MemoryDirectoryLister::new()
            .with_file("/sys/svg2pdf.transdef1", COMMAND)
            .with_file("/sys/svg2png.transdef1", COMMAND);
        repo.lister = Arc::new(conflicting);
        assert!(repo.sync(true).is_err());
        assert!(!repo.is_synced());
        assert!(repo.installed_translators().is_empty());
    }
}
