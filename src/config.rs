// Configuration handling for AutoTrans
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result, TransError};
use crate::inclusion::TranslatorConfig;
use crate::level::TranslatorLevel;
use crate::translator::GenerationMode;

/// Environment variable overriding the default system translator directory
pub const SYSTEM_DIR_ENV: &str = "AUTOTRANS_SYSTEM_DIR";

const DEFAULT_SYSTEM_DIR: &str = "/usr/share/autotrans/translators";

/// Engine configuration, passed explicitly to the repository and the runner
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Translators shipped with the installation (SYSTEM level, scanned recursively)
    pub installation_directory: PathBuf,
    /// Per-user translators (USER level, scanned recursively)
    pub user_directory: PathBuf,
    /// Directory of the document being built; its translators are not searched recursively
    pub document_directory: Option<PathBuf>,
    /// Extra DOCUMENT-level translator directories, scanned recursively
    pub include_paths: Vec<PathBuf>,
    /// Where source images are searched; defaults to the document directory
    pub image_paths: Vec<PathBuf>,
    pub recursive_image_search: bool,
    pub generation_mode: GenerationMode,
    pub ignore_system_translators: bool,
    pub ignore_user_translators: bool,
    pub ignore_document_translators: bool,
    /// Load unversioned `.transdef` / `.transdef0` files
    pub legacy_definitions: bool,
    /// Capture exceptions of the in-process backend instead of propagating them
    pub intercept_script_exceptions: bool,
    /// Inclusion decisions: level name -> translator name -> included
    pub translators: BTreeMap<String, BTreeMap<String, bool>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            installation_directory: default_installation_directory(),
            user_directory: default_user_directory(),
            document_directory: None,
            include_paths: Vec::new(),
            image_paths: Vec::new(),
            recursive_image_search: true,
            generation_mode: GenerationMode::default(),
            ignore_system_translators: false,
            ignore_user_translators: false,
            ignore_document_translators: false,
            legacy_definitions: false,
            intercept_script_exceptions: false,
            translators: BTreeMap::new(),
        }
    }
}

fn default_installation_directory() -> PathBuf {
    std::env::var_os(SYSTEM_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SYSTEM_DIR))
}

fn default_user_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autotrans")
        .join("translators")
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
                suggestion: Some("Create the file or omit --config to use defaults".to_string()),
            }
            .into());
        }

        if !path.is_file() {
            return Err(ConfigError::InvalidValue {
                message: "Configuration path is not a file".to_string(),
                field: "config_path".to_string(),
                value: path.display().to_string(),
                expected: "file path".to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(TransError::Io)?;
        Self::from_yaml_with_context(&content, Some(path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with_context(yaml, None)
    }

    fn from_yaml_with_context(yaml: &str, file_path: Option<&Path>) -> Result<Self> {
        // An empty document means "all defaults"
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| {
                let mut config_error = Box::<ConfigError>::from(e);
                if let ConfigError::InvalidYaml {
                    file_path: ref mut location,
                    ..
                } = *config_error
                {
                    *location = file_path.map(Path::to_path_buf);
                }
                TransError::Config(config_error)
            })?
        };

        config.validate()?;
        tracing::debug!(
            document = ?config.document_directory,
            mode = %config.generation_mode,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (level_key, decisions) in &self.translators {
            let level = Self::decision_level(level_key)?;
            if level == TranslatorLevel::Never {
                return Err(ConfigError::InvalidValue {
                    message: "inclusion decisions need an installable level".to_string(),
                    field: "translators".to_string(),
                    value: level_key.clone(),
                    expected: "system, user or document".to_string(),
                }
                .into());
            }
            if let Some(empty) = decisions.keys().find(|name| name.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    message: "translator names cannot be empty".to_string(),
                    field: format!("translators.{level_key}"),
                    value: empty.clone(),
                    expected: "translator name such as svg2pdf".to_string(),
                }
                .into());
            }
        }

        for path in &self.include_paths {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    message: "include paths cannot be empty".to_string(),
                    field: "include_paths".to_string(),
                    value: String::new(),
                    expected: "directory path".to_string(),
                }
                .into());
            }
        }

        if let Some(dir) = &self.document_directory {
            if dir.is_file() {
                return Err(ConfigError::InvalidValue {
                    message: "document directory points to a file".to_string(),
                    field: "document_directory".to_string(),
                    value: dir.display().to_string(),
                    expected: "directory path".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    fn decision_level(key: &str) -> Result<TranslatorLevel> {
        key.parse::<TranslatorLevel>()
    }

    /// Inclusion table built from the `translators` section
    pub fn translator_config(&self) -> Result<TranslatorConfig> {
        let mut config = TranslatorConfig::new();
        for (level_key, decisions) in &self.translators {
            let level = Self::decision_level(level_key)?;
            for (name, included) in decisions {
                config.set_included(name, level, Some(*included))?;
            }
        }
        Ok(config)
    }

    /// Level whose conflicts are fatal: DOCUMENT when document-level translator
    /// directories are configured, USER otherwise
    pub fn active_level(&self) -> TranslatorLevel {
        if self.document_directory.is_some() || !self.include_paths.is_empty() {
            TranslatorLevel::Document
        } else {
            TranslatorLevel::User
        }
    }

    pub fn is_level_ignored(&self, level: TranslatorLevel) -> bool {
        match level {
            TranslatorLevel::Never => true,
            TranslatorLevel::System => self.ignore_system_translators,
            TranslatorLevel::User => self.ignore_user_translators,
            TranslatorLevel::Document => self.ignore_document_translators,
        }
    }

    /// Directories scanned for `level`, each with its recursion flag, in scan order
    pub fn level_directories(&self, level: TranslatorLevel) -> Vec<(PathBuf, bool)> {
        match level {
            TranslatorLevel::Never => Vec::new(),
            TranslatorLevel::System => vec![(self.installation_directory.clone(), true)],
            TranslatorLevel::User => vec![(self.user_directory.clone(), true)],
            TranslatorLevel::Document => self
                .include_paths
                .iter()
                .map(|path| (path.clone(), true))
                .chain(self.document_directory.iter().map(|dir| (dir.clone(), false)))
                .collect(),
        }
    }

    /// Directories searched for source images
    pub fn effective_image_paths(&self) -> Vec<PathBuf> {
        if self.image_paths.is_empty() {
            self.document_directory.iter().cloned().collect()
        } else {
            self.image_paths.clone()
        }
    }

    pub fn with_installation_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.installation_directory = dir.into();
        self
    }

    pub fn with_user_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_directory = dir.into();
        self
    }

    pub fn with_document_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.document_directory = Some(dir.into());
        self
    }

    pub fn with_include_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.include_paths = paths;
        self
    }

    pub fn with_image_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.image_paths = paths;
        self
    }

    pub fn with_recursive_image_search(mut self, recursive: bool) -> Self {
        self.recursive_image_search = recursive;
        self
    }

    pub fn with_generation_mode(mut self, mode: GenerationMode) -> Self {
        self.generation_mode = mode;
        self
    }

    pub fn with_legacy_definitions(mut self, enabled: bool) -> Self {
        self.legacy_definitions = enabled;
        self
    }

    pub fn with_exception_interception(mut self, intercept: bool) -> Self {
        self.intercept_script_exceptions = intercept;
        self
    }

    /// Skip scanning `level` entirely
    pub fn ignoring(mut self, level: TranslatorLevel) -> Self {
        match level {
            TranslatorLevel::System => self.ignore_system_translators = true,
            TranslatorLevel::User => self.ignore_user_translators = true,
            TranslatorLevel::Document => self.ignore_document_translators = true,
            TranslatorLevel::Never => {}
        }
        self
    }

    /// Record an inclusion decision in the `translators` section
    pub fn with_translator_decision(
        mut self,
        level: TranslatorLevel,
        name: impl Into<String>,
        included: bool,
    ) -> Self {
        self.translators
            .entry(level.as_str().to_string())
            .or_default()
            .insert(name.into(), included);
        self
    }
}
