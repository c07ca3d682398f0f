// Python backend (external interpreter)

use crate::error::Result;

use super::base::{escape_double_quoted, BaseInterpreter};
use super::environment::{Environment, Value};
use super::{binding_name, check_variable_name, Interpreter, InterpreterKind, ScriptOutcome};

/// Reserved words of Python 3; bindings with these names are prefixed with `_`
pub(crate) const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Runs translator functions with `python3 -`, falling back to `python`
pub struct PythonInterpreter {
    base: BaseInterpreter,
}

impl PythonInterpreter {
    pub fn new() -> Self {
        Self {
            base: BaseInterpreter::new(InterpreterKind::Python, &["python3", "python"], &["-"]),
        }
    }
}

impl Default for PythonInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Python literal of `value`; shared with the in-process backend
pub(crate) fn python_literal(value: &Value) -> String {
    match value {
        Value::Unset => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Text(text) => python_string(text),
        Value::List(items) => format!(
            "[{}]",
            items.iter().map(python_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Set(items) if items.is_empty() => "set()".to_string(),
        Value::Set(items) => format!(
            "{{{}}}",
            items
                .iter()
                .map(|item| python_string(item))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Map(entries) => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(key, value)| format!("{}: {}", python_string(key), python_literal(value)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn python_string(text: &str) -> String {
    format!("\"{}\"", escape_double_quoted(text, false, false))
}

/// One `name = literal` line per binding
pub(crate) fn python_preamble(interpreter: &str, environment: &Environment) -> Result<String> {
    let mut preamble = String::new();
    for (name, value) in environment.iter() {
        check_variable_name(interpreter, name)?;
        preamble.push_str(&binding_name(name, PYTHON_KEYWORDS));
        preamble.push_str(" = ");
        preamble.push_str(&python_literal(value));
        preamble.push('\n');
    }
    Ok(preamble)
}

impl Interpreter for PythonInterpreter {
    fn kind(&self) -> InterpreterKind {
        InterpreterKind::Python
    }

    fn runnable(&self) -> bool {
        self.base.runnable()
    }

    fn preamble(&self, environment: &Environment) -> Result<String> {
        python_preamble(self.interpreter(), environment)
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
    fn test_python_literals() {
        assert_eq!(python_literal(&Value::Unset), "None");
        assert_eq!(python_literal(&Value::Bool(false)), "False");
        assert_eq!(python_literal(&Value::from("say \"hi\"\n")), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(python_literal(&Value::Set(BTreeSet::new())), "set()");

        let mut map = BTreeMap::new();
        map.insert("exts".to_string(), Value::from(vec![".svg", ".svgz"]));
        map.insert("tex".to_string(), Value::Bool(true));
        assert_eq!(
            python_literal(&Value::Map(map)),
            "{\"exts\": [\".svg\", \".svgz\"], \"tex\": True}"
        );
    }

    #[test]
    fn test_python_preamble_prefixes_keywords() {
        let env = Environment::new().with("in", "a.svg").with("out", "a.pdf");
        let preamble = PythonInterpreter::new().preamble(&env).unwrap();
        assert_eq!(preamble, "_in = \"a.svg\"\nout = \"a.pdf\"\n");
    }

    #[test]
    fn test_python_preamble_rejects_bad_names() {
        let env = Environment::new().with("not-valid", 1);
        let err = PythonInterpreter::new().preamble(&env).unwrap_err();
        assert!(err.to_string().contains("not-valid"));
    }

    #[test]
    fn test_python_run_echoes_bindings() {
        let python = PythonInterpreter::new();
        if !python.runnable() {
            return;
        }
        let env = Environment::new()
            .with("name", vec!["a", "b"])
            .with("count", 3)
            .with("flag", true);
        let outcome = python
            .run("print('\\n'.join(name))\nprint(count)\nassert flag is True", &env)
            .unwrap();

        assert!(outcome.success(), "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout, "a\nb\n3\n");
    }

    #[test]
    fn test_python_failure_reports_exit_code() {
        let python = PythonInterpreter::new();
        if !python.runnable() {
            return;
        }
        let outcome = python.run("raise ValueError('boom')", &Environment::new()).unwrap();
        assert_eq!(outcome.exit_code, 1);
        assert!(outcome.stderr.contains("ValueError"));
        assert!(outcome.exception.is_none());
    }
}
