use std::sync::Arc;

use anyhow::Context;
use cmsync_core::ArtifactKind;
use cmsync_core::manifest::HashManifest;
use cmsync_core::store::{LocalItemStore, MemoryItemStore};
use cmsync_core::sync::{ReconciliationEngine, SyncContext, SyncOptions};
use tokio::sync::Mutex;

use super::common::{CommandOptions, selected_kinds, selection_mode, status_filter};
use crate::cli::SelectionArgs;

pub struct Status;

impl Status {
    /// List the push working set of every selected type
    ///
    /// Works offline: only the local folders and the manifest are read.
    /// Manifest entries of deleted files are dropped on the way.
    pub async fn execute(args: &SelectionArgs, options: &CommandOptions<'_>) -> anyhow::Result<()> {
        let selection = selection_mode(args)?;
        let config = options.load_config()?;
        let matcher = config.pattern_matcher()?;
        let manifest = Arc::new(Mutex::new(HashManifest::load(options.dir).await));
        let label = if args.ignore_timestamps { "selected" } else { "modified" };

        let mut any_folder = false;
        for kind in selected_kinds(args, &selection, &ArtifactKind::PUSH_ORDER) {
            let local = LocalItemStore::new(options.dir, kind).with_matcher(matcher.clone());
            if !local.exists().await {
                continue;
            }
            any_folder = true;

            let stale = manifest.lock().await.prune_stale(kind).await;
            if options.verbose {
                for location in &stale {
                    println!("  forgetting deleted {kind} {location}");
                }
            }

            let engine = ReconciliationEngine::new(
                local,
                Arc::new(MemoryItemStore::new(kind)),
                Arc::clone(&manifest),
            );
            let ctx = SyncContext::new(kind).with_options(SyncOptions {
                selection: selection.clone(),
                status: status_filter(args),
                ..SyncOptions::default()
            });
            let set = engine
                .compute_push_set(&ctx)
                .await
                .with_context(|| format!("Failed to list {kind}"))?;

            println!("{kind}: {} {label}", set.len());
            for reference in set.refs() {
                println!("  {reference}");
            }
        }

        if !any_folder {
            println!("No artifact directories exist in {}", options.dir.display());
        }
        Ok(())
    }
}
