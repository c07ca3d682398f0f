// POSIX shell backend

use crate::error::{InterpreterError, Result};

use super::base::BaseInterpreter;
use super::environment::{Environment, Value};
use super::{check_variable_name, Interpreter, InterpreterKind, ScriptOutcome};

/// Runs translator functions with `sh -s`.
///
/// POSIX shells have no arrays. A list or set `name` is bound three ways:
/// `name` holds the items one per line, `name_count` their number, and
/// `name_0` .. `name_<n-1>` each item verbatim. Mappings are rejected.
pub struct ShellInterpreter {
    base: BaseInterpreter,
}

impl ShellInterpreter {
    pub fn new() -> Self {
        Self {
            base: BaseInterpreter::new(InterpreterKind::Shell, &["sh"], &["-s"]),
        }
    }

    fn quote(text: &str) -> String {
        format!("'{}'", text.replace('\'', "'\\''"))
    }

    fn scalar(&self, name: &str, value: &Value) -> Result<String> {
        match value {
            Value::Bool(true) => Ok("true".to_string()),
            Value::Bool(false) => Ok("false".to_string()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Text(text) => Ok(Self::quote(text)),
            other => Err(InterpreterError::UnsupportedValue {
                interpreter: self.interpreter().to_string(),
                variable: name.to_string(),
                kind: other.kind().to_string(),
            }
            .into()),
        }
    }

    fn item(&self, name: &str, value: &Value) -> Result<String> {
        match value {
            Value::Bool(_) | Value::Integer(_) | Value::Text(_) => Ok(value.to_plain_string()),
            other => Err(InterpreterError::UnsupportedValue {
                interpreter: self.interpreter().to_string(),
                variable: name.to_string(),
                kind: format!("nested {}", other.kind()),
            }
            .into()),
        }
    }

    fn assignment(&self, name: &str, value: &Value) -> Result<String> {
        match value {
            Value::Unset => Ok(format!("unset {name}")),
            Value::List(items) => {
                let rendered = items
                    .iter()
                    .map(|item| self.item(name, item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::sequence(name, &rendered))
            }
            Value::Set(items) => {
                let rendered: Vec<String> = items.iter().cloned().collect();
                Ok(Self::sequence(name, &rendered))
            }
            other => Ok(format!("{name}={}", self.scalar(name, other)?)),
        }
    }

    fn sequence(name: &str, items: &[String]) -> String {
        let mut lines = vec![
            format!("{name}={}", Self::quote(&items.join("\n"))),
            format!("{name}_count={}", items.len()),
        ];
        for (index, item) in items.iter().enumerate() {
            lines.push(format!("{name}_{index}={}", Self::quote(item)));
        }
        lines.join("\n")
    }
}

impl Default for ShellInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter for ShellInterpreter {
    fn kind(&self) -> InterpreterKind {
        InterpreterKind::Shell
    }

    fn runnable(&self) -> bool {
        self.base.runnable()
    }

    fn preamble(&self, environment: &Environment) -> Result<String> {
        let mut preamble = String::new();
        for (name, value) in environment.iter() {
            check_variable_name(self.interpreter(), name)?;
            preamble.push_str(&self.assignment(name, value)?);
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
