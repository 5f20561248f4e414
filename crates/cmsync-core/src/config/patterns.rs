//! Gitignore-style pattern matching using the ignore crate

use std::path::Path;

use anyhow::Context;
use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Pattern matcher for local artifact files
///
/// Paths are matched relative to the type folder, so `drafts/` ignores
/// `layouts/drafts/...` but not a `drafts` folder of another type.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    gitignore: Option<Gitignore>,
}

impl PatternMatcher {
    /// Create a matcher that includes everything
    #[must_use]
    pub const fn new() -> Self {
        Self { gitignore: None }
    }

    /// Build pattern matcher from ignore and include patterns
    ///
    /// # Errors
    ///
    /// Returns an error if patterns are invalid.
    pub fn with_patterns(
        ignore_patterns: &[String],
        include_patterns: &[String],
    ) -> anyhow::Result<Self> {
        if ignore_patterns.is_empty() && include_patterns.is_empty() {
            return Ok(Self::new());
        }

        let mut builder = GitignoreBuilder::new("");

        for pattern in ignore_patterns {
            builder
                .add_line(None, pattern)
                .with_context(|| format!("Invalid ignore pattern: '{pattern}'"))?;
        }

        // Include patterns are negated ignores
        for pattern in include_patterns {
            builder
                .add_line(None, &format!("!{pattern}"))
                .with_context(|| format!("Invalid include pattern: '{pattern}'"))?;
        }

        let gitignore = builder.build()?;

        Ok(Self {
            gitignore: Some(gitignore),
        })
    }

    /// Check if a path should be included based on patterns
    #[must_use]
    pub fn should_include(&self, path: &Path, is_dir: bool) -> bool {
        self.gitignore
            .as_ref()
            .is_none_or(|gi| !gi.matched(path, is_dir).is_ignore())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_no_patterns() {
        let matcher = PatternMatcher::new();
        assert!(matcher.should_include(&PathBuf::from("any/file.json"), false));
    }

    #[test]
    fn test_ignore_pattern() {
        let matcher = PatternMatcher::with_patterns(&["*.bak.json".to_string()], &[]).unwrap();

        assert!(!matcher.should_include(&PathBuf::from("home.bak.json"), false));
        assert!(matcher.should_include(&PathBuf::from("home.json"), false));
    }

    #[test]
    fn test_include_overrides_ignore() {
        let matcher = PatternMatcher::with_patterns(
            &["draft-*".to_string()],
            &["draft-keep_cmd.json".to_string()],
        )
        .unwrap();

        assert!(!matcher.should_include(&PathBuf::from("draft-1_cmd.json"), false));
        assert!(matcher.should_include(&PathBuf::from("draft-keep_cmd.json"), false));
    }

    #[test]
    fn test_directory_patterns() {
        let matcher = PatternMatcher::with_patterns(&["scratch/".to_string()], &[]).unwrap();

        assert!(!matcher.should_include(&PathBuf::from("scratch"), true));
        assert!(matcher.should_include(&PathBuf::from("header"), true));
    }
}
