//! Edit staging for a single custom profile
//!
//! A session holds the index and original name of the custom profile being
//! edited plus a working copy. Dirtiness is never tracked: it is computed by
//! comparing the working copy with the entry at the same index in the last
//! synchronized custom collection. After every resync the session is rebased
//! so its index keeps pointing at the profile it was started for.

use crate::config::Profile;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditSession {
    #[default]
    Idle,
    Editing {
        index: usize,
        original_name: String,
        working: Profile,
    },
}

/// Outcome of [`EditSession::rebase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebase {
    Unchanged,
    Moved,
    Dropped,
}

impl EditSession {
    /// Start editing the custom profile called `name`. Yields `Idle` when no
    /// custom profile has that exact name.
    pub fn begin(customs: &[Profile], name: &str) -> Self {
        match customs.iter().position(|p| p.name == name) {
            Some(index) => Self::Editing {
                index,
                original_name: name.to_string(),
                working: customs[index].clone(),
            },
            None => Self::Idle,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, Self::Editing { .. })
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Editing { index, .. } => Some(*index),
            Self::Idle => None,
        }
    }

    /// Name of the profile as it was when the session started
    pub fn original_name(&self) -> Option<&str> {
        match self {
            Self::Editing { original_name, .. } => Some(original_name),
            Self::Idle => None,
        }
    }

    pub fn working_copy(&self) -> Option<&Profile> {
        match self {
            Self::Editing { working, .. } => Some(working),
            Self::Idle => None,
        }
    }

    pub fn working_copy_mut(&mut self) -> Option<&mut Profile> {
        match self {
            Self::Editing { working, .. } => Some(working),
            Self::Idle => None,
        }
    }

    /// True if the working copy differs from `customs[index]`
    pub fn has_changes(&self, customs: &[Profile]) -> bool {
        match self {
            Self::Editing { index, working, .. } => customs.get(*index) != Some(working),
            Self::Idle => false,
        }
    }

    /// Re-locate the edited profile in a freshly synchronized collection.
    /// The working copy is kept; the session goes idle when the profile no
    /// longer exists.
    pub fn rebase(&mut self, customs: &[Profile]) -> Rebase {
        let Self::Editing {
            index,
            original_name,
            ..
        } = self
        else {
            return Rebase::Unchanged;
        };

        if customs.get(*index).is_some_and(|p| p.name == *original_name) {
            return Rebase::Unchanged;
        }
        match customs.iter().position(|p| p.name == *original_name) {
            Some(found) => {
                *index = found;
                Rebase::Moved
            }
            None => {
                *self = Self::Idle;
                Rebase::Dropped
            }
        }
    }

    /// Copy of `customs` with the working copy at the staged index. None
    /// when idle or when the index no longer holds the edited profile.
    pub fn staged_collection(&self, customs: &[Profile]) -> Option<Vec<Profile>> {
        let Self::Editing {
            index,
            original_name,
            working,
        } = self
        else {
            return None;
        };
        if !customs.get(*index).is_some_and(|p| p.name == *original_name) {
            return None;
        }
        let mut profiles = customs.to_vec();
        profiles[*index] = working.clone();
        Some(profiles)
    }
}
