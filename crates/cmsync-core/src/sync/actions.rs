//! Push action determination logic

use std::fmt;

use crate::artifact::Artifact;

/// Remote write to perform for one local artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAction {
    /// The artifact has never been pushed, or create-only was requested
    Create,
    /// The artifact carries a server id
    Update,
}

/// How a successful push ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// New remote item
    Created,
    /// Existing remote item replaced
    Updated,
    /// Update found no remote item, so it was created instead
    RecreatedViaFallback,
    /// Create conflicted with an existing item and create-only accepts that
    ConflictIgnored,
    /// Dry run; nothing was sent
    WouldPush(PushAction),
}

impl fmt::Display for PushOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::RecreatedViaFallback => "recreated",
            Self::ConflictIgnored => "already exists",
            Self::WouldPush(PushAction::Create) => "would create",
            Self::WouldPush(PushAction::Update) => "would update",
        };
        f.write_str(label)
    }
}

/// How a successful pull ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Saved to the given location
    Pulled(String),
    /// Saved, but the server digest does not match the content
    PulledWithWarning {
        /// Location written
        location: String,
        /// Warning message
        message: String,
    },
    /// Dry run; nothing was written
    WouldPull(String),
}

impl PullOutcome {
    /// Location the artifact was (or would be) written to
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Pulled(location)
            | Self::WouldPull(location)
            | Self::PulledWithWarning { location, .. } => location,
        }
    }
}

/// Resolves local artifacts into push actions
pub struct PushActionResolver;

impl PushActionResolver {
    /// Decide between create and update
    #[must_use]
    pub fn resolve(artifact: &Artifact, create_only: bool) -> PushAction {
        if create_only || artifact.id().is_none() {
            PushAction::Create
        } else {
            PushAction::Update
        }
    }

    /// Whether a conflict on create counts as success
    ///
    /// Create-only pushes accept an existing item. With force override that
    /// acceptance is governed by `ignored_with_force_override`.
    #[must_use]
    pub const fn conflict_is_success(
        create_only: bool,
        force_override: bool,
        ignored_with_force_override: bool,
    ) -> bool {
        create_only && (!force_override || ignored_with_force_override)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(value: serde_json::Value) -> Artifact {
        Artifact::from_value(value, "test").unwrap()
    }

    #[test]
    fn test_resolve() {
        let new = artifact(json!({"name": "a"}));
        let synced = artifact(json!({"id": "1", "name": "a"}));

        assert_eq!(PushActionResolver::resolve(&new, false), PushAction::Create);
        assert_eq!(PushActionResolver::resolve(&synced, false), PushAction::Update);
        assert_eq!(PushActionResolver::resolve(&synced, true), PushAction::Create);
    }

    #[test]
    fn test_conflict_is_success() {
        assert!(PushActionResolver::conflict_is_success(true, false, false));
        assert!(PushActionResolver::conflict_is_success(true, true, true));
        assert!(!PushActionResolver::conflict_is_success(true, true, false));
        assert!(!PushActionResolver::conflict_is_success(false, false, true));
        assert!(!PushActionResolver::conflict_is_success(false, true, true));
    }
}
