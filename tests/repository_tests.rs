// Integration tests for translator discovery, inclusion and conflict detection

use autotrans::error::TransError;
use autotrans::level::TranslatorLevel;
use autotrans::TranslatorConfig;

use test_utils::{copy_translator, TranslatorTree};

fn a2b_a2c_tree() -> TranslatorTree {
    let tree = TranslatorTree::new();
    tree.install(TranslatorLevel::System, "a2b.transdef1", &copy_translator(".b"));
    tree.install(TranslatorLevel::User, "a2c.transdef1", &copy_translator(".c"));
    tree
}

#[test]
fn test_conflict_across_levels_raises_at_document_level() {
    let tree = a2b_a2c_tree();
    let mut repo = tree.repository(tree.document_config());

    let err = repo.sync(true).unwrap_err();
    match err {
        TransError::Conflict(conflict) => {
            assert_eq!(conflict.level, TranslatorLevel::Document);
            assert_eq!(conflict.conflicts.len(), 1);
            assert_eq!(conflict.conflicts[0].full_source, "a");
            assert_eq!(conflict.conflicts[0].translators, vec!["a2b", "a2c"]);
            assert!(conflict.snippet.contains("a2c: false"));
        }
        other => panic!("Expected conflict, got {other:?}"),
    }
    assert!(!repo.is_synced());
}

#[test]
fn test_conflict_resolved_by_exclusion() {
    let tree = a2b_a2c_tree();
    let mut repo = tree.repository(tree.document_config());
    repo.translator_config_mut()
        .set_included("a2c", TranslatorLevel::Document, Some(false))
        .unwrap();

    repo.sync(true).unwrap();

    let included = repo.get_included_translators_with_levels();
    assert_eq!(included.get("a2b"), Some(&TranslatorLevel::System));
    assert!(!included.contains_key("a2c"));
    assert_eq!(
        repo.translator_for_source("a").unwrap().name.as_str(),
        "a2b"
    );
}

#[test]
fn test_conflict_ignored_without_detection() {
    let tree = a2b_a2c_tree();
    let mut repo = tree.repository(tree.document_config());
    repo.sync(false).unwrap();

    // Higher inclusion level wins the source type
    assert_eq!(
        repo.translator_for_source("a").unwrap().name.as_str(),
        "a2c"
    );
}

#[test]
fn test_exclusion_from_configuration_file() {
    let tree = a2b_a2c_tree();
    let config = tree
        .document_config()
        .with_translator_decision(TranslatorLevel::User, "a2b", false);
    let mut repo = tree.repository(config);
    repo.sync(true).unwrap();

    assert!(repo.is_included("a2c"));
    assert!(!repo.is_included("a2b"));
    assert_eq!(repo.installed_translators().len(), 2);
}

#[test]
fn test_sync_is_idempotent() {
    let tree = a2b_a2c_tree();
    tree.install(TranslatorLevel::Document, "svg2pdf.transdef1", &copy_translator(".pdf"));
    let mut repo = tree.repository(tree.document_config());
    repo.translator_config_mut()
        .set_included("a2b", TranslatorLevel::User, Some(false))
        .unwrap();

    repo.sync(true).unwrap();
    let first_included = repo.get_included_translators_with_levels();
    let first_installed: Vec<String> = repo.installed_translators().into_keys().collect();
    let first_effective = repo.effective_config().cloned();

    repo.sync(true).unwrap();
    assert_eq!(repo.get_included_translators_with_levels(), first_included);
    assert_eq!(
        repo.installed_translators().into_keys().collect::<Vec<_>>(),
        first_installed
    );
    assert_eq!(repo.effective_config().cloned(), first_effective);
}

#[test]
fn test_inclusion_inherits_upwards() {
    let mut config = TranslatorConfig::new();
    config
        .set_included("svg2pdf", TranslatorLevel::System, Some(true))
        .unwrap();
    config
        .set_included("svg2pdf", TranslatorLevel::User, Some(false))
        .unwrap();

    // A decision at level L holds at every higher level with no own decision
    assert_eq!(config.included("svg2pdf", TranslatorLevel::System, true), Some(true));
    assert_eq!(config.included("svg2pdf", TranslatorLevel::User, true), Some(false));
    assert_eq!(config.included("svg2pdf", TranslatorLevel::Document, true), Some(false));
    assert_eq!(config.included("svg2pdf", TranslatorLevel::Document, false), None);

    config
        .set_included("svg2pdf", TranslatorLevel::User, None)
        .unwrap();
    assert_eq!(config.included("svg2pdf", TranslatorLevel::Document, true), Some(true));
    assert_eq!(config.inclusion_level("svg2pdf"), Some(TranslatorLevel::System));
}

#[test]
fn test_higher_level_definition_shadows_lower() {
    let tree = TranslatorTree::new();
    tree.install(
        TranslatorLevel::System,
        "svg2pdf.transdef1",
        "OUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = inkscape $in -o $out\n",
    );
    tree.install(
        TranslatorLevel::User,
        "svg2pdf.transdef1",
        "OUTPUT_EXTENSIONS = .pdf\nCOMMAND_LINE = rsvg-convert -f pdf -o $out $in\n",
    );
    let mut repo = tree.repository(tree.user_config());
    repo.sync(true).unwrap();

    let definition = repo.translator("svg2pdf").unwrap();
    assert_eq!(definition.level, TranslatorLevel::User);
    assert_eq!(
        repo.installed_translators_at(TranslatorLevel::System).len(),
        1
    );
}

#[test]
fn test_ignored_level_is_not_scanned() {
    let tree = a2b_a2c_tree();
    let mut repo = tree.repository(tree.document_config().ignoring(TranslatorLevel::User));
    repo.sync(true).unwrap();

    assert_eq!(
        repo.installed_translators().into_keys().collect::<Vec<_>>(),
        vec!["a2b"]
    );
}

#[test]
fn test_malformed_definitions_are_skipped() {
    let tree = TranslatorTree::new();
    tree.install(TranslatorLevel::System, "a2b.transdef1", &copy_translator(".b"));
    tree.install(TranslatorLevel::System, "broken.transdef1", &copy_translator(".x"));
    tree.install(TranslatorLevel::System, "x2y.transdef1", "INPUT_EXTENSIONS = .x\n");
    tree.install(TranslatorLevel::System, "notes.txt", "not a translator");
    let mut repo = tree.repository(tree.user_config());
    repo.sync(true).unwrap();

    assert_eq!(
        repo.installed_translators().into_keys().collect::<Vec<_>>(),
        vec!["a2b"]
    );
}
