//! Push and pull summaries

use std::fmt::Write;
use std::path::Path;

use super::SyncResult;

/// What a summary needs to know beyond the counts
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportContext<'a> {
    /// Per-item lines were already printed
    pub verbose: bool,
    /// Every artifact was selected, not only modified ones
    pub ignore_timestamps: bool,
    /// Nothing was written
    pub dry_run: bool,
    /// At least one selected type folder exists (push only)
    pub directories_exist: bool,
    /// Log file with per-item details
    pub log_file: Option<&'a Path>,
}

/// Sync operation reporter
pub struct SyncReporter;

impl SyncReporter {
    /// One-paragraph push summary
    ///
    /// Returns the message and whether it reports a failure.
    #[must_use]
    pub fn push_summary(result: &SyncResult, ctx: &ReportContext<'_>) -> (String, bool) {
        if result.total() == 0 {
            return if !ctx.directories_exist {
                (
                    "No artifact directories exist in the working directory.".to_string(),
                    true,
                )
            } else if ctx.ignore_timestamps {
                ("Push complete. No artifacts were found to push.".to_string(), false)
            } else {
                (
                    "Push complete. No modified artifacts were found to push.".to_string(),
                    false,
                )
            };
        }

        let verb = if ctx.dry_run { "would be pushed" } else { "successfully pushed" };
        let message = Self::counts("Push complete.", result, verb, ctx);
        (message, !result.is_success())
    }

    /// One-paragraph pull summary
    ///
    /// Returns the message and whether it reports a failure.
    #[must_use]
    pub fn pull_summary(result: &SyncResult, ctx: &ReportContext<'_>) -> (String, bool) {
        if result.total() == 0 {
            let message = if ctx.ignore_timestamps {
                "Pull complete. No artifacts were found to pull."
            } else {
                "Pull complete. No modified artifacts were found to pull."
            };
            return (message.to_string(), false);
        }

        let verb = if ctx.dry_run { "would be pulled" } else { "successfully pulled" };
        let mut message = Self::counts("Pull complete.", result, verb, ctx);
        if result.warning_count > 0 {
            let _ = write!(message, " {}.", plural(result.warning_count, "warning", "warnings"));
        }
        (message, !result.is_success())
    }

    fn counts(prefix: &str, result: &SyncResult, verb: &str, ctx: &ReportContext<'_>) -> String {
        let mut message = prefix.to_string();
        if result.count > 0 {
            let _ = write!(
                message,
                " {} {verb}.",
                plural(result.count, "artifact", "artifacts")
            );
        }
        if result.error_count > 0 {
            let _ = write!(message, " {}.", plural(result.error_count, "error", "errors"));
        }
        if !ctx.verbose {
            if let Some(log) = ctx.log_file {
                let _ = write!(message, " See {} for details.", log.display());
            }
        }
        message
    }

    /// Detailed breakdown of a result
    #[must_use]
    pub fn generate_summary(result: &SyncResult) -> String {
        let mut output = String::new();

        output.push_str("\n=== Sync Summary ===\n");
        let _ = writeln!(output, "Created:   {}", result.created);
        let _ = writeln!(output, "Updated:   {}", result.updated);
        if result.recreated > 0 {
            let _ = writeln!(output, "Recreated: {}", result.recreated);
        }
        if result.conflicts_ignored > 0 {
            let _ = writeln!(output, "Existing:  {}", result.conflicts_ignored);
        }
        if result.warning_count > 0 {
            let _ = writeln!(output, "Warnings:  {}", result.warning_count);
        }

        if !result.errors.is_empty() {
            let _ = writeln!(output, "\nErrors ({}):", result.errors.len());
            for error in &result.errors {
                let _ = writeln!(output, "  - {error}");
            }
        }

        let _ = writeln!(output, "\nTotal artifacts: {}", result.total());

        if result.is_success() {
            output.push_str("Status: ✓ Success\n");
        } else {
            output.push_str("Status: ✗ Completed with errors\n");
        }

        output
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {one}")
    } else {
        format!("{count} {many}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ReportContext<'static> {
        ReportContext {
            directories_exist: true,
            ..ReportContext::default()
        }
    }

    #[test]
    fn test_push_summary_counts() {
        let result = SyncResult {
            count: 3,
            error_count: 1,
            errors: vec!["home: boom".into()],
            ..SyncResult::default()
        };
        let log = Path::new("/work/.cmsync/cmsync.log");
        let context = ReportContext {
            log_file: Some(log),
            ..ctx()
        };

        let (message, is_error) = SyncReporter::push_summary(&result, &context);
        assert_eq!(
            message,
            "Push complete. 3 artifacts successfully pushed. 1 error. See /work/.cmsync/cmsync.log for details."
        );
        assert!(is_error);
    }

    #[test]
    fn test_push_summary_nothing_to_do() {
        let empty = SyncResult::default();

        let (message, is_error) = SyncReporter::push_summary(&empty, &ReportContext::default());
        assert!(message.contains("No artifact directories"));
        assert!(is_error);

        let (message, is_error) = SyncReporter::push_summary(&empty, &ctx());
        assert!(message.contains("No modified artifacts"));
        assert!(!is_error);

        let all = ReportContext {
            ignore_timestamps: true,
            ..ctx()
        };
        let (message, _) = SyncReporter::push_summary(&empty, &all);
        assert_eq!(message, "Push complete. No artifacts were found to push.");
    }

    #[test]
    fn test_pull_summary_warnings_and_dry_run() {
        let result = SyncResult {
            count: 1,
            warning_count: 1,
            ..SyncResult::default()
        };
        let context = ReportContext {
            verbose: true,
            dry_run: true,
            ..ctx()
        };
        let (message, is_error) = SyncReporter::pull_summary(&result, &context);
        assert_eq!(message, "Pull complete. 1 artifact would be pulled. 1 warning.");
        assert!(!is_error);
    }

    #[test]
    fn test_generate_summary() {
        let result = SyncResult {
            count: 2,
            created: 1,
            recreated: 1,
            ..SyncResult::default()
        };
        let summary = SyncReporter::generate_summary(&result);
        assert!(summary.contains("Created:   1"));
        assert!(summary.contains("Recreated: 1"));
        assert!(summary.contains("Total artifacts: 2"));
        assert!(summary.contains("Success"));
    }
}
