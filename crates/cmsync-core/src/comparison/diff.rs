//! Diff generation with color-coded output

use std::fmt::Write;

use similar::{ChangeTag, TextDiff};

use crate::artifact::Artifact;
use crate::error::Result;

const DIFF_CONTEXT_LINES: usize = 3;

/// Diff generator for comparing a local artifact with its remote version
pub struct DiffGenerator;

impl Default for DiffGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffGenerator {
    /// Create a new diff generator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Diff two artifacts after pretty-printing them
    ///
    /// `remote` is the old side, `local` the new side, so the output reads as
    /// "what a push would change".
    ///
    /// # Errors
    ///
    /// Returns an error if either artifact cannot be serialized.
    pub fn generate_artifacts(
        local: &Artifact,
        remote: &Artifact,
        local_label: &str,
        remote_label: &str,
        color: bool,
    ) -> Result<String> {
        let local_text = local.to_pretty_json()?;
        let remote_text = remote.to_pretty_json()?;
        Ok(if color {
            Self::generate_from_content(&local_text, &remote_text, local_label, remote_label)
        } else {
            Self::generate_plain(&local_text, &remote_text)
        })
    }

    /// Generate a color-coded unified diff from string contents
    #[must_use]
    pub fn generate_from_content(
        source_content: &str,
        dest_content: &str,
        source_label: &str,
        dest_label: &str,
    ) -> String {
        let diff = TextDiff::from_lines(dest_content, source_content);

        let mut output = String::new();

        let _ = writeln!(output, "\x1b[1m--- {dest_label}\x1b[0m");
        let _ = writeln!(output, "\x1b[1m+++ {source_label}\x1b[0m");

        for (idx, group) in diff.grouped_ops(DIFF_CONTEXT_LINES).iter().enumerate() {
            if idx > 0 {
                output.push_str("...\n");
            }

            for op in group {
                for change in diff.iter_changes(op) {
                    let (sign, color) = match change.tag() {
                        ChangeTag::Delete => ("-", "\x1b[31m"), // Red
                        ChangeTag::Insert => ("+", "\x1b[32m"), // Green
                        ChangeTag::Equal => (" ", "\x1b[0m"),
                    };

                    let newline = if change.value().ends_with('\n') {
                        ""
                    } else {
                        "\n"
                    };

                    let _ = write!(output, "{color}{sign}{}{newline}\x1b[0m", change.value());
                }
            }
        }

        output
    }

    /// Generate a plain line-by-line diff, only showing changed hunks
    #[must_use]
    pub fn generate_plain(source_content: &str, dest_content: &str) -> String {
        let diff = TextDiff::from_lines(dest_content, source_content);
        let mut output = String::new();

        for group in diff.grouped_ops(DIFF_CONTEXT_LINES) {
            for op in group {
                for change in diff.iter_changes(&op) {
                    let sign = match change.tag() {
                        ChangeTag::Delete => "-",
                        ChangeTag::Insert => "+",
                        ChangeTag::Equal => " ",
                    };
                    let _ = write!(output, "{sign}{}", change.value());
                }
            }
        }

        output
    }

    /// Whether two artifacts serialize identically
    #[must_use]
    pub fn is_identical(local: &Artifact, remote: &Artifact) -> bool {
        local.as_map() == remote.as_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(text: &str) -> Artifact {
        Artifact::from_json(text, "test").unwrap()
    }

    #[test]
    fn test_diff_identical_content() {
        let diff = DiffGenerator::generate_plain("line 1\nline 2\n", "line 1\nline 2\n");
        assert!(diff.is_empty());
    }

    #[test]
    fn test_diff_changed_line() {
        let diff = DiffGenerator::generate_plain(
            "line 1\nmodified line 2\nline 3\n",
            "line 1\nline 2\nline 3\n",
        );

        assert!(diff.contains("-line 2"));
        assert!(diff.contains("+modified line 2"));
    }

    #[test]
    fn test_diff_with_colors() {
        let diff = DiffGenerator::generate_from_content("new line\n", "old line\n", "local", "remote");

        assert!(diff.contains("--- remote"));
        assert!(diff.contains("+++ local"));
        assert!(diff.contains("\x1b[31m")); // Red for deletions
        assert!(diff.contains("\x1b[32m")); // Green for insertions
    }

    #[test]
    fn test_artifact_diff() {
        let local = artifact(r#"{"id":"1","name":"Home","title":"New"}"#);
        let remote = artifact(r#"{"id":"1","name":"Home","title":"Old"}"#);

        let diff =
            DiffGenerator::generate_artifacts(&local, &remote, "local", "remote", false).unwrap();
        assert!(diff.contains(r#"-  "title": "Old""#));
        assert!(diff.contains(r#"+  "title": "New""#));
        assert!(!DiffGenerator::is_identical(&local, &remote));
        assert!(DiffGenerator::is_identical(&local, &local.clone()));
    }
}
