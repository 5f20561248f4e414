use std::io::IsTerminal;

use anyhow::Context;
use cmsync_core::ArtifactKind;
use cmsync_core::comparison::DiffGenerator;

use super::common::{CommandOptions, EngineFactory};

pub struct Diff;

impl Diff {
    /// Show what pushing the named artifact would change on the server
    pub async fn execute(
        kind: ArtifactKind,
        name: &str,
        options: &CommandOptions<'_>,
    ) -> anyhow::Result<()> {
        let factory = EngineFactory::new(options).await?;
        let engine = factory.engine(kind)?;
        let ctx = factory.context(kind);

        let (local, remote) = engine
            .fetch_pair(&ctx, name)
            .await
            .with_context(|| format!("Failed to fetch {kind} {name}"))?;

        if DiffGenerator::is_identical(&local, &remote) {
            println!("No differences for {kind} {name}");
            return Ok(());
        }

        let local_label = format!("local/{name}");
        let remote_label = format!("remote/{name}");
        let diff = DiffGenerator::generate_artifacts(
            &local,
            &remote,
            &local_label,
            &remote_label,
            std::io::stdout().is_terminal(),
        )?;
        print!("{diff}");
        Ok(())
    }
}
