use anyhow::Context;
use cmsync_core::ArtifactKind;
use cmsync_core::sync::{
    ReportContext, SelectionMode, SyncOptions, SyncReporter, SyncResult,
};
use tracing::{debug, error};

use super::common::{
    CommandOptions, EngineFactory, EventPrinter, selected_kinds, selection_mode, status_filter,
};
use crate::cli::PushArgs;

pub struct Push;

impl Push {
    /// Push every selected artifact type in dependency order
    ///
    /// Returns whether the run finished without errors.
    pub async fn execute(args: &PushArgs, options: &CommandOptions<'_>) -> anyhow::Result<bool> {
        let selection = selection_mode(&args.selection)?;
        let kinds = selected_kinds(&args.selection, &selection, &ArtifactKind::PUSH_ORDER);
        let factory = EngineFactory::new(options).await?;

        if options.dry_run {
            println!("Dry run: nothing will be sent to the content hub");
        }

        let mut total = SyncResult::default();
        let mut directories_exist = false;

        for kind in kinds {
            let engine = factory.engine(kind)?;
            if !engine.local().exists().await {
                debug!(%kind, folder = %engine.local().root().display(), "no local folder");
                continue;
            }
            directories_exist = true;

            let sync_options = SyncOptions {
                selection: selection.clone(),
                create_only: args.create_only,
                force_override: args.force_override,
                conflict_ignored_with_force_override: factory
                    .config()
                    .conflict_ignored_with_force_override(),
                status: status_filter(&args.selection),
                fail_fast: args.failure.fail_fast,
                dry_run: options.dry_run,
                set_tag: args.set_tag.clone(),
                set_library: args.set_library.clone(),
            };

            if options.verbose {
                println!("Pushing {kind}...");
            }

            let (events, printer) = EventPrinter::spawn(options.verbose);
            let ctx = factory
                .context(kind)
                .with_options(sync_options)
                .with_events(events);
            let outcome = match &selection {
                SelectionMode::Named(named) => {
                    engine.push_named_item(&ctx, named).await.map(|pushed| {
                        let mut result = SyncResult::default();
                        result.record_push(pushed);
                        result
                    })
                }
                _ => engine.push(&ctx).await,
            };
            drop(ctx);
            printer.finish().await;

            match outcome {
                Ok(result) => total.merge(result),
                Err(e) if args.failure.continue_on_error => {
                    error!(%kind, "push failed: {e}");
                    total.error_count += 1;
                    total.errors.push(format!("{kind}: {e}"));
                }
                Err(e) => return Err(e).with_context(|| format!("Failed to push {kind}")),
            }
        }

        let report = ReportContext {
            verbose: options.verbose,
            ignore_timestamps: args.selection.ignore_timestamps,
            dry_run: options.dry_run,
            directories_exist,
            log_file: options.log_file,
        };
        let (message, is_error) = SyncReporter::push_summary(&total, &report);
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
