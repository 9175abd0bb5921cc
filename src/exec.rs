//! Synchronous command execution
//!
//! Runs a program to completion and yields either its stdout or an error,
//! never both.

use std::ffi::OsStr;
use std::io;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {}: {}", exit_label(.code), .stderr.trim())]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

impl ExecError {
    /// Exit code of a program that ran and failed
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => *code,
            Self::Spawn { .. } => None,
        }
    }
}

/// Run `program` with `args`, block until it exits and return its stdout
pub fn run_sync<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Vec<u8>, ExecError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let label = program.to_string_lossy().into_owned();
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    debug!(command = ?command, "Running command");

    let output = command.output().map_err(|source| ExecError::Spawn {
        program: label.clone(),
        source,
    })?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(ExecError::Failed {
            program: label,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
