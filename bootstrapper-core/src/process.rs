//! Synchronous runner for external executables.
//!
//! Every tool boundary (`ocm`, `git`, `kustomize`, `kubectl`) goes through
//! [`ToolCommand`] so failures carry the same shape: program, arguments, exit
//! code and the combined stdout/stderr.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::ToolError;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (false, true) => stdout.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Builder for one invocation of an external program.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    stdin: Option<Vec<u8>>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.envs.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments joined with spaces, for messages.
    pub fn display_args(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion and capture output, whatever the exit code.
    pub fn run(&self) -> Result<ToolOutput, ToolError> {
        let resolved = resolve_program(&self.program)?;
        tracing::trace!("exec: {} {}", self.program, self.display_args());

        let mut cmd = Command::new(resolved);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if self.stdin.is_some() { Stdio::piped() } else { Stdio::null() });
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }

        let spawn_err = |source| ToolError::Spawn { program: self.program.clone(), source };
        let mut child = cmd.spawn().map_err(spawn_err)?;
        if let (Some(input), Some(mut pipe)) = (&self.stdin, child.stdin.take()) {
            pipe.write_all(input).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run and turn a non-zero exit into [`ToolError::Failed`].
    pub fn run_checked(&self) -> Result<ToolOutput, ToolError> {
        let output = self.run()?;
        if output.success() {
            Ok(output)
        } else {
            Err(ToolError::Failed {
                program: self.program.clone(),
                args: self.display_args(),
                code: output.code,
                output: output.combined(),
            })
        }
    }
}

/// Bare program names are looked up on PATH; anything with a path separator is used as is.
fn resolve_program(program: &str) -> Result<PathBuf, ToolError> {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return Ok(PathBuf::from(program));
    }
    which::which(program).map_err(|source| ToolError::NotFound {
        program: program.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_output_joins_streams() {
        let out = ToolOutput { code: Some(1), stdout: "out\n".into(), stderr: " err ".into() };
        assert_eq!(out.combined(), "out\nerr");
        let only_err = ToolOutput { code: Some(1), stdout: String::new(), stderr: "err".into() };
        assert_eq!(only_err.combined(), "err");
    }

    #[test]
    fn missing_program_is_not_found() {
        let err = ToolCommand::new("definitely-not-an-installed-tool-4711")
            .arg("--version")
            .run()
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }), "got: {err}");
    }

    #[test]
    fn display_args_joins_with_spaces() {
        let cmd = ToolCommand::new("ocm").args(["get", "componentversion"]).arg("--output");
        assert_eq!(cmd.display_args(), "get componentversion --output");
        assert_eq!(cmd.program(), "ocm");
    }

    #[cfg(unix)]
    #[test]
    fn run_checked_reports_exit_code_and_stdin_is_forwarded() {
        let ok = ToolCommand::new("sh")
            .args(["-c", "cat"])
            .stdin("hello")
            .run_checked()
            .expect("sh -c cat");
        assert_eq!(ok.stdout, "hello");

        let err = ToolCommand::new("sh")
            .args(["-c", "echo nope >&2; exit 3"])
            .run_checked()
            .unwrap_err();
        match err {
            ToolError::Failed { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "nope");
            }
            other => panic!("expected Failed, got {other}"),
        }
    }
}
