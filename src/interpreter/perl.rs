// Perl backend

use crate::error::Result;

use super::base::{escape_single_quoted, BaseInterpreter};
use super::environment::{Environment, Value};
use super::{check_variable_name, Interpreter, InterpreterKind, ScriptOutcome};

/// Runs translator functions with `perl -`.
///
/// Bindings are package variables declared with `our`, so bodies may `use strict`.
/// Top-level lists and sets become `@name`, mappings `%name`, everything else `$name`.
pub struct PerlInterpreter {
    base: BaseInterpreter,
}

impl PerlInterpreter {
    pub fn new() -> Self {
        Self {
            base: BaseInterpreter::new(InterpreterKind::Perl, &["perl"], &["-"]),
        }
    }

    fn literal(value: &Value) -> String {
        match value {
            Value::Unset => "undef".to_string(),
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Text(text) => format!("'{}'", escape_single_quoted(text)),
            Value::List(items) => format!("[{}]", Self::items(items.iter())),
            Value::Set(items) => format!(
                "[{}]",
                Self::items(items.iter().map(|s| Value::Text(s.clone())).collect::<Vec<_>>().iter())
            ),
            Value::Map(entries) => format!("{{{}}}", Self::pairs(entries.iter())),
        }
    }

    fn items<'a>(items: impl Iterator<Item = &'a Value>) -> String {
        items.map(Self::literal).collect::<Vec<_>>().join(", ")
    }

    fn pairs<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> String {
        entries
            .map(|(key, value)| format!("'{}' => {}", escape_single_quoted(key), Self::literal(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn assignment(name: &str, value: &Value) -> String {
        match value {
            Value::List(items) => format!("our @{name} = ({});", Self::items(items.iter())),
            Value::Set(items) => format!(
                "our @{name} = ({});",
                items
                    .iter()
                    .map(|s| format!("'{}'", escape_single_quoted(s)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Value::Map(entries) => format!("our %{name} = ({});", Self::pairs(entries.iter())),
            scalar => format!("our ${name} = {};", Self::literal(scalar)),
        }
    }
}

impl Default for PerlInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter for PerlInterpreter {
    fn kind(&self) -> InterpreterKind {
        InterpreterKind::Perl
    }

    fn runnable(&self) -> bool {
        self.base.runnable()
    }

    fn preamble(&self, environment: &Environment) -> Result<String> {
        let mut preamble = String::new();
        for (name, value) in environment.iter() {
            check_variable_name(self.interpreter(), name)?;
            preamble.push_str(&Self::assignment(name, value));
            preamble.push('\n');
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
