//! Commit through an escalation wrapper re-invoking the helper binary

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{CommitChannel, CommitError, PayloadKind};
use crate::config::{Paths, Profile, Settings};
use crate::constants::{escalation, helper};
use crate::exec::{self, ExecError};
use crate::persistence;

/// Stages the payload in a fixed temp file, then runs
/// `<escalation> <daemon-exec> --new-settings|--new-profiles <tmp>`
#[derive(Debug, Clone)]
pub struct PkexecChannel {
    escalation: String,
    daemon_exec: PathBuf,
    paths: Paths,
}

impl PkexecChannel {
    pub fn new(escalation: impl Into<String>, daemon_exec: impl Into<PathBuf>, paths: Paths) -> Self {
        Self {
            escalation: escalation.into(),
            daemon_exec: daemon_exec.into(),
            paths,
        }
    }

    fn staging_file(&self, kind: PayloadKind) -> &Path {
        match kind {
            PayloadKind::Settings => &self.paths.tmp_settings,
            PayloadKind::Profiles => &self.paths.tmp_profiles,
        }
    }

    /// Program and arguments of the escalated helper call
    fn command_line(&self, kind: PayloadKind) -> (String, Vec<OsString>) {
        let mut words = self.escalation.split_whitespace();
        let program = words.next().unwrap_or_default().to_string();
        let mut args: Vec<OsString> = words.map(OsString::from).collect();

        args.push(self.daemon_exec.clone().into_os_string());
        // The escalation wrapper scrubs the environment, so a non-default
        // location must travel on the command line
        if !self.paths.is_default_config_dir() {
            args.push(helper::CONFIG_DIR.into());
            args.push(self.paths.config_dir.clone().into_os_string());
        }
        args.push(kind.flag().into());
        args.push(self.staging_file(kind).as_os_str().to_owned());
        (program, args)
    }

    fn invoke(&self, kind: PayloadKind) -> Result<(), CommitError> {
        let (program, args) = self.command_line(kind);
        info!(program = %program, payload = ?kind, "Invoking privileged helper");

        match exec::run_sync(&program, &args) {
            Ok(_) => {
                info!(payload = ?kind, "Privileged helper succeeded");
                Ok(())
            }
            Err(e) if is_denied(&e) => {
                warn!(payload = ?kind, error = %e, "Authorization denied");
                Err(CommitError::PrivilegeDenied)
            }
            Err(e) => {
                warn!(payload = ?kind, error = %e, "Privileged helper failed");
                Err(CommitError::Helper(e))
            }
        }
    }
}

fn is_denied(err: &ExecError) -> bool {
    matches!(
        err.exit_code(),
        Some(escalation::EXIT_DISMISSED | escalation::EXIT_NOT_AUTHORIZED)
    )
}

impl CommitChannel for PkexecChannel {
    fn commit_settings(&mut self, settings: &Settings) -> Result<(), CommitError> {
        persistence::write_settings(settings, self.staging_file(PayloadKind::Settings))?;
        self.invoke(PayloadKind::Settings)
    }

    fn commit_profiles(&mut self, profiles: &[Profile]) -> Result<(), CommitError> {
        persistence::write_profiles(profiles, self.staging_file(PayloadKind::Profiles))?;
        self.invoke(PayloadKind::Profiles)
    }
}
