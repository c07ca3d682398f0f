// In-process Python backend
//
// Runs scripts inside the host process through pyo3 when the `embedded-python`
// feature is enabled. Without it the backend reports itself as not runnable.

use crate::error::Result;
#[cfg(not(feature = "embedded-python"))]
use crate::error::InterpreterError;

use super::environment::Environment;
use super::python::python_preamble;
use super::{Interpreter, InterpreterKind, ScriptOutcome};

/// Executes translator functions in an embedded Python interpreter.
///
/// Each run gets fresh globals and captured `sys.stdout`/`sys.stderr`.
/// `SystemExit` becomes the exit code. Any other exception is returned as
/// `InterpreterError::ScriptRaised` unless interception is enabled, in which
/// case it is reported in [`ScriptOutcome::exception`] with exit code 1.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedPythonInterpreter {
    intercept_exceptions: bool,
}

impl EmbeddedPythonInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exception_interception(mut self, intercept: bool) -> Self {
        self.intercept_exceptions = intercept;
        self
    }

    pub fn intercepts_exceptions(&self) -> bool {
        self.intercept_exceptions
    }
}

impl Interpreter for EmbeddedPythonInterpreter {
    fn kind(&self) -> InterpreterKind {
        InterpreterKind::EmbeddedPython
    }

    fn runnable(&self) -> bool {
        cfg!(feature = "embedded-python")
    }

    fn preamble(&self, environment: &Environment) -> Result<String> {
        python_preamble(self.interpreter(), environment)
    }

    #[cfg(feature = "embedded-python")]
    fn run(&self, script: &str, environment: &Environment) -> Result<ScriptOutcome> {
        let mut source = self.preamble(environment)?;
        source.push_str(script);
        if !source.ends_with('\n') {
            source.push('\n');
        }
        pyo3_backend::run(self.interpreter(), &source, self.intercept_exceptions)
    }

    #[cfg(not(feature = "embedded-python"))]
    fn run(&self, _script: &str, _environment: &Environment) -> Result<ScriptOutcome> {
        Err(InterpreterError::MissingBackend {
            interpreter: self.interpreter().to_string(),
            translator: None,
            suggestion: Some("Rebuild with the `embedded-python` feature".to_string()),
        }
        .into())
    }
}

#[cfg(feature = "embedded-python")]
mod pyo3_backend {
    use pyo3::exceptions::PySystemExit;
    use pyo3::prelude::*;
    use pyo3::types::PyDict;
    use std::ffi::CString;

    use crate::error::{InterpreterError, Result, TransError};
    use crate::interpreter::ScriptOutcome;

    struct Captured {
        stdout: String,
        stderr: String,
        error: Option<PyErr>,
    }

    fn raised(interpreter: &str, exception: String) -> TransError {
        InterpreterError::ScriptRaised {
            interpreter: interpreter.to_string(),
            exception,
            stdout: String::new(),
            stderr: String::new(),
        }
        .into()
    }

    fn execute(py: Python<'_>, code: &CString) -> PyResult<Captured> {
        let sys = py.import("sys")?;
        let io = py.import("io")?;
        let stdout = io.call_method0("StringIO")?;
        let stderr = io.call_method0("StringIO")?;
        let saved_stdout = sys.getattr("stdout")?;
        let saved_stderr = sys.getattr("stderr")?;

        let globals = PyDict::new(py);
        globals.set_item("__name__", "__main__")?;

        sys.setattr("stdout", &stdout)?;
        sys.setattr("stderr", &stderr)?;
        let result = py.run(code.as_c_str(), Some(&globals), None);
        sys.setattr("stdout", saved_stdout)?;
        sys.setattr("stderr", saved_stderr)?;

        Ok(Captured {
            stdout: stdout.call_method0("getvalue")?.extract()?,
            stderr: stderr.call_method0("getvalue")?.extract()?,
            error: result.err(),
        })
    }

    /// Exit code carried by `SystemExit`: `None` is 0, integers are kept, anything else is 1
    fn exit_code(py: Python<'_>, err: &PyErr) -> i32 {
        match err.value(py).getattr("code") {
            Ok(code) if code.is_none() => 0,
            Ok(code) => code.extract::<i32>().unwrap_or(1),
            Err(_) => 1,
        }
    }

    pub(super) fn run(interpreter: &str, source: &str, intercept: bool) -> Result<ScriptOutcome> {
        let code = CString::new(source)
            .map_err(|_| raised(interpreter, "script contains a NUL byte".to_string()))?;

        Python::attach(|py| {
            let captured = execute(py, &code).map_err(|e| raised(interpreter, e.to_string()))?;
            let mut outcome = ScriptOutcome {
                stdout: captured.stdout,
                stderr: captured.stderr,
                exception: None,
                exit_code: 0,
            };

            match captured.error {
                None => {}
                Some(err) if err.is_instance_of::<PySystemExit>(py) => {
                    outcome.exit_code = exit_code(py, &err);
                }
                Some(err) if intercept => {
                    tracing::debug!(interpreter, exception = %err, "Intercepted script exception");
                    outcome.exception = Some(err.to_string());
                    outcome.exit_code = 1;
                }
                Some(err) => {
                    return Err(InterpreterError::ScriptRaised {
                        interpreter: interpreter.to_string(),
                        exception: err.to_string(),
                        stdout: outcome.stdout,
                        stderr: outcome.stderr,
                    }
                    .into());
                }
            }
            Ok(outcome)
        })
    }
}
