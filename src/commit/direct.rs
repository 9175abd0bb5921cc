//! In-process commit for callers that already hold the needed privileges

use tracing::info;

use super::{CommitChannel, CommitError};
use crate::config::{Paths, Profile, Settings};
use crate::daemon::helper;

/// Runs the helper's install step in the current process: same validation,
/// same atomic replace, same daemon notification
#[derive(Debug, Clone)]
pub struct DirectChannel {
    paths: Paths,
}

impl DirectChannel {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }
}

impl CommitChannel for DirectChannel {
    fn commit_settings(&mut self, settings: &Settings) -> Result<(), CommitError> {
        info!(path = %self.paths.settings_file.display(), "Committing settings in-process");
        helper::install_settings(&self.paths, settings)?;
        Ok(())
    }

    fn commit_profiles(&mut self, profiles: &[Profile]) -> Result<(), CommitError> {
        info!(path = %self.paths.profiles_file.display(), "Committing profiles in-process");
        helper::install_profiles(&self.paths, profiles.to_vec())?;
        Ok(())
    }
}
