use anyhow::Context;
use cmsync_core::ArtifactKind;
use cmsync_core::sync::{
    ReportContext, SelectionMode, SyncOptions, SyncReporter, SyncResult,
};
use tracing::error;

use super::common::{
    CommandOptions, EngineFactory, EventPrinter, selected_kinds, selection_mode, status_filter,
};
use crate::cli::PullArgs;

pub struct Pull;

impl Pull {
    /// Pull every selected artifact type
    ///
    /// Returns whether the run finished without errors.
    pub async fn execute(args: &PullArgs, options: &CommandOptions<'_>) -> anyhow::Result<bool> {
        let selection = selection_mode(&args.selection)?;
        let kinds = selected_kinds(&args.selection, &selection, &ArtifactKind::PULL_ORDER);
        let factory = EngineFactory::new(options).await?;

        if options.dry_run {
            println!("Dry run: no local files will be written");
        }

        let mut total = SyncResult::default();

        for kind in kinds {
            let engine = factory.engine(kind)?;
            let sync_options = SyncOptions {
                selection: selection.clone(),
                status: status_filter(&args.selection),
                fail_fast: args.failure.fail_fast,
                dry_run: options.dry_run,
                ..SyncOptions::default()
            };

            if options.verbose {
                println!("Pulling {kind}...");
            }

            let (events, printer) = EventPrinter::spawn(options.verbose);
            let ctx = factory
                .context(kind)
                .with_options(sync_options)
                .with_events(events);
            let outcome = match &selection {
                SelectionMode::Named(named) => {
                    engine.pull_named_item(&ctx, named).await.map(|pulled| {
                        let mut result = SyncResult::default();
                        result.record_pull(&pulled);
                        result
                    })
                }
                _ => engine.pull(&ctx).await,
            };
            drop(ctx);
            printer.finish().await;

            match outcome {
                Ok(result) => total.merge(result),
                Err(e) if args.failure.continue_on_error => {
                    error!(%kind, "pull failed: {e}");
                    total.error_count += 1;
                    total.errors.push(format!("{kind}: {e}"));
                }
                Err(e) => return Err(e).with_context(|| format!("Failed to pull {kind}")),
            }
        }

        let report = ReportContext {
            verbose: options.verbose,
            ignore_timestamps: args.selection.ignore_timestamps,
            dry_run: options.dry_run,
            directories_exist: true,
            log_file: options.log_file,
        };
        let (message, is_error) = SyncReporter::pull_summary(&total, &report);
        if is_error {
            eprintln!("{message}");
        } else {
            println!("{message}");
        }
        if options.verbose && total.total() > 0 {
            print!("{}", SyncReporter::generate_summary(&total));
        }

        Ok(!is_error)
    }
}
