//! Privileged commit channel
//!
//! Commits hand a new settings object or custom profile collection to the
//! privileged side, which validates it and replaces the authoritative file.
//! The front-end never writes authoritative files itself.

use thiserror::Error;

use crate::config::{Profile, Settings};
use crate::constants::helper;
use crate::daemon::helper::{InstallError, ValidationError};
use crate::exec::ExecError;
use crate::persistence::PersistenceError;

mod direct;
mod pkexec;

pub use direct::DirectChannel;
pub use pkexec::PkexecChannel;

/// Which authoritative file a commit replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Settings,
    Profiles,
}

impl PayloadKind {
    /// Helper flag announcing the payload kind
    pub fn flag(self) -> &'static str {
        match self {
            PayloadKind::Settings => helper::NEW_SETTINGS,
            PayloadKind::Profiles => helper::NEW_PROFILES,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("failed to stage payload: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("authorization was denied")]
    PrivilegeDenied,

    #[error("privileged helper failed: {0}")]
    Helper(#[source] ExecError),

    #[error("payload rejected: {0}")]
    Rejected(#[from] ValidationError),
}

impl From<InstallError> for CommitError {
    fn from(err: InstallError) -> Self {
        match err {
            InstallError::Invalid(e) => CommitError::Rejected(e),
            InstallError::Persistence(e) => CommitError::Persistence(e),
        }
    }
}

/// Port to the privileged side. Calls block until the commit either took
/// effect or failed; there are no automatic retries.
pub trait CommitChannel {
    fn commit_settings(&mut self, settings: &Settings) -> Result<(), CommitError>;

    fn commit_profiles(&mut self, profiles: &[Profile]) -> Result<(), CommitError>;
}
