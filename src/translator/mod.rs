// Translator descriptors, definition files and the records built from them

pub mod definition;
pub mod name;
pub mod reader;

pub use definition::{split_command_line, GenerationMode, TranslatorAction, TranslatorDefinition};
pub use name::{TranslatorName, LAYERS_MODIFIER, TEX_MODIFIER};
pub use reader::{
    parse_definition_file_name, DefinitionEntries, DefinitionEntry, DefinitionFormat,
    DefinitionReader, EntryValue, LineDefinitionReader, YamlDefinitionReader,
    DEFINITION_EXTENSION,
};
