// Ruby backend

use crate::error::Result;

use super::base::{escape_single_quoted, BaseInterpreter};
use super::environment::{Environment, Value};
use super::{binding_name, check_variable_name, Interpreter, InterpreterKind, ScriptOutcome};

const RUBY_KEYWORDS: &[&str] = &[
    "BEGIN", "END", "alias", "and", "begin", "break", "case", "class", "def", "defined",
    "do", "else", "elsif", "end", "ensure", "false", "for", "if", "in", "module", "next",
    "nil", "not", "or", "redo", "rescue", "retry", "return", "self", "super", "then", "true",
    "undef", "unless", "until", "when", "while", "yield",
];

/// Runs translator functions with `ruby -`.
///
/// Bindings are top-level locals; reserved words such as `in` are bound as `_in`.
/// Blocks and lambdas see them, but a `def` body opens a new scope, so methods
/// must receive bindings as arguments.
/// Sets need the `set` library, which the preamble requires only when a set is bound.
pub struct RubyInterpreter {
    base: BaseInterpreter,
}

impl RubyInterpreter {
    pub fn new() -> Self {
        Self {
            base: BaseInterpreter::new(InterpreterKind::Ruby, &["ruby"], &["-"]),
        }
    }

    fn string(text: &str) -> String {
        format!("'{}'", escape_single_quoted(text))
    }

    fn literal(value: &Value) -> String {
        match value {
            Value::Unset => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Text(text) => Self::string(text),
            Value::List(items) => format!(
                "[{}]",
                items.iter().map(Self::literal).collect::<Vec<_>>().join(", ")
            ),
            Value::Set(items) => format!(
                "Set[{}]",
                items
                    .iter()
                    .map(|item| Self::string(item))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Value::Map(entries) if entries.is_empty() => "{}".to_string(),
            Value::Map(entries) => format!(
                "{{ {} }}",
                entries
                    .iter()
                    .map(|(key, value)| format!("{} => {}", Self::string(key), Self::literal(value)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    fn uses_set(value: &Value) -> bool {
        match value {
            Value::Set(_) => true,
            Value::List(items) => items.iter().any(Self::uses_set),
            Value::Map(entries) => entries.values().any(Self::uses_set),
            _ => false,
        }
    }
}

impl Default for RubyInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter for RubyInterpreter {
    fn kind(&self) -> InterpreterKind {
        InterpreterKind::Ruby
    }

    fn runnable(&self) -> bool {
        self.base.runnable()
    }

    fn preamble(&self, environment: &Environment) -> Result<String> {
        let mut preamble = String::new();
        if environment.iter().any(|(_, value)| Self::uses_set(value)) {
            preamble.push_str("require 'set'\n");
        }
        for (name, value) in environment.iter() {
            check_variable_name(self.interpreter(), name)?;
            preamble.push_str(&format!(
                "{} = {}\n",
                binding_name(name, RUBY_KEYWORDS),
                Self::literal(value)
            ));
        }
        Ok(preamble)
    }

    fn run(&self, script: &str, environment: &Environment) -> Result<ScriptOutcome> {
        let mut source = self.preamble(environment)?;
        source.push_str(script);
        if !source.ends_with('\n') {
            source.push('\n');
        }
        self.base.run_source(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn test_ruby_preamble_literals() {
        let mut options = BTreeMap::new();
        options.insert("dpi".to_string(), Value::Integer(300));
        let exts: BTreeSet<String> = [".svgz", ".svg"].iter().map(|s| s.to_string()).collect();

        let env = Environment::new()
            .with("in", "it's.svg")
            .with("inexts", exts)
            .with("options", options)
            .with("gone", Value::Unset);

        let preamble = RubyInterpreter::new().preamble(&env).unwrap();
        assert_eq!(
            preamble,
            "require 'set'\n\
             _in = 'it\\'s.svg'\n\
             inexts = Set['.svg', '.svgz']\n\
             options = { 'dpi' => 300 }\n\
             gone = nil\n"
        );
    }

    #[test]
    fn test_ruby_preamble_without_sets_skips_require() {
        let env = Environment::new().with("flag", false);
        let preamble = RubyInterpreter::new().preamble(&env).unwrap();
        assert_eq!(preamble, "flag = false\n");
    }

    #[test]
    fn test_ruby_run_echoes_bindings() {
        let ruby = RubyInterpreter::new();
        if !ruby.runnable() {
            return;
        }
        let env = Environment::new().with("name", vec!["a", "b"]).with("count", 3);
        let outcome = ruby.run("puts name\nputs count", &env).unwrap();

        assert!(outcome.success(), "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout, "a\nb\n3\n");
    }

    #[test]
    fn test_ruby_bindings_reach_blocks_but_not_methods() {
        let ruby = RubyInterpreter::new();
        if !ruby.runnable() {
            return;
        }
        let env = Environment::new().with("in", "fig.svg");
        let script = r#"shout = lambda { _in.upcase }
def quoted(path) "<#{path}>" end
puts shout.call
puts quoted(_in)
puts defined?(_in).inspect
def hidden() defined?(_in).inspect end
puts hidden
"#;
        let outcome = ruby.run(script, &env).unwrap();

        assert!(outcome.success(), "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout, "FIG.SVG\n<fig.svg>\n\"local-variable\"\nnil\n");
    }
}
