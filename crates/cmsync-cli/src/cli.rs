use clap::{Args, Parser, Subcommand, ValueEnum};
use cmsync_core::ArtifactKind;
use std::path::PathBuf;

/// Content Hub Artifact Synchronization Tool
///
/// Push and pull JSON authoring artifacts (types, content, layouts, pages, ...)
/// between a working directory and a content hub
#[derive(Parser, Debug)]
#[command(name = "cmsync")]
#[command(about, long_about = None, version)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Preview changes without executing (dry-run)
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Working directory holding the artifact folders (default: current directory)
    #[arg(short = 'd', long, global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Base URL of the content hub API
    #[arg(long, global = true, env = "CMSYNC_URL", value_name = "URL")]
    pub url: Option<String>,

    /// User name for basic authentication
    #[arg(long, global = true, env = "CMSYNC_USER", value_name = "USER")]
    pub user: Option<String>,

    /// Password for basic authentication (prompted for when omitted)
    #[arg(
        long,
        global = true,
        env = "CMSYNC_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub password: Option<String>,

    /// Use specific config file
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Ignore all config files
    #[arg(long, global = true, conflicts_with = "config")]
    pub no_config: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Push local artifacts to the content hub
    Push(PushArgs),

    /// Pull artifacts from the content hub into the working directory
    Pull(PullArgs),

    /// Show the artifacts a push would send, without contacting the server
    Status {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Display the differences between a local artifact and its remote version
    Diff {
        /// Artifact type of the item
        #[arg(short = 't', long = "type", value_enum)]
        artifact_type: ArtifactType,

        /// Name, path or id of the item
        #[arg(long)]
        named: String,
    },

    /// Show active configuration and debug settings
    Config,
}

/// Options selecting the artifacts to act on
#[derive(Args, Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SelectionArgs {
    /// Filter by artifact type(s); every type when omitted
    #[arg(short = 't', long = "type", value_enum)]
    pub types: Vec<ArtifactType>,

    /// Select every artifact type
    #[arg(short = 'A', long = "all-authoring", conflicts_with = "types")]
    pub all_authoring: bool,

    /// Select all artifacts, not only those modified since the last sync
    #[arg(short = 'I', long)]
    pub ignore_timestamps: bool,

    /// Select the single artifact with this name, path or id
    #[arg(long, conflicts_with_all = ["ignore_timestamps", "path"])]
    pub named: Option<String>,

    /// Select artifacts below this path (path-based types only)
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    /// Only ready items of versioned types
    #[arg(long, conflicts_with = "draft")]
    pub ready: bool,

    /// Only draft items of versioned types
    #[arg(long)]
    pub draft: bool,
}

/// Options controlling how failures end a run
#[derive(Args, Debug, Clone, Default)]
pub struct FailureArgs {
    /// Stop a type at its first failed artifact
    #[arg(long)]
    pub fail_fast: bool,

    /// Keep going with the next type when a type fails
    #[arg(long)]
    pub continue_on_error: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PushArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub failure: FailureArgs,

    /// Always create, treating items that already exist as pushed
    #[arg(long)]
    pub create_only: bool,

    /// Overwrite remote items even when their revision changed
    #[arg(short = 'f', long)]
    pub force_override: bool,

    /// Add this tag to pushed items of types with tags
    #[arg(long, value_name = "TAG")]
    pub set_tag: Option<String>,

    /// Assign pushed items of types with libraries to this library
    #[arg(long, value_name = "LIBRARY_ID")]
    pub set_library: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PullArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub failure: FailureArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArtifactType {
    /// Content types
    Types,
    /// Content items
    Content,
    /// Categories
    Categories,
    /// Layouts
    Layouts,
    /// Layout mappings
    LayoutMappings,
    /// Sites
    Sites,
    /// Site pages
    Pages,
    /// Image profiles
    ImageProfiles,
    /// Renditions
    Renditions,
    /// Publishing profiles
    PublishingProfiles,
    /// Publishing sources
    PublishingSources,
    /// Publishing site revisions
    PublishingSiteRevisions,
}

impl From<ArtifactType> for ArtifactKind {
    fn from(value: ArtifactType) -> Self {
        match value {
            ArtifactType::Types => Self::Types,
            ArtifactType::Content => Self::Content,
            ArtifactType::Categories => Self::Categories,
            ArtifactType::Layouts => Self::Layouts,
            ArtifactType::LayoutMappings => Self::LayoutMappings,
            ArtifactType::Sites => Self::Sites,
            ArtifactType::Pages => Self::Pages,
            ArtifactType::ImageProfiles => Self::ImageProfiles,
            ArtifactType::Renditions => Self::Renditions,
            ArtifactType::PublishingProfiles => Self::PublishingProfiles,
            ArtifactType::PublishingSources => Self::PublishingSources,
            ArtifactType::PublishingSiteRevisions => Self::PublishingSiteRevisions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_value_names_match_service_names() {
        for value in ArtifactType::value_variants() {
            let name = value.to_possible_value().unwrap();
            let kind = ArtifactKind::from(*value);
            assert_eq!(name.get_name(), kind.service_name());
        }
    }

    #[test]
    fn test_push_flags() {
        let cli = Cli::parse_from([
            "cmsync",
            "push",
            "-t",
            "content",
            "--named",
            "Home",
            "--create-only",
            "-f",
        ]);
        let Commands::Push(args) = cli.command else {
            panic!("expected push");
        };
        assert_eq!(args.selection.types, vec![ArtifactType::Content]);
        assert_eq!(args.selection.named.as_deref(), Some("Home"));
        assert!(args.create_only);
        assert!(args.force_override);
    }

    #[test]
    fn test_named_conflicts_with_ignore_timestamps() {
        let result = Cli::try_parse_from(["cmsync", "pull", "--named", "x", "-I"]);
        assert!(result.is_err());
    }
}
