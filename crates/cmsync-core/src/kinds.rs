//! Artifact type catalogue
//!
//! Every artifact type is described by an [`ItemTypeConfig`]: the REST
//! endpoint, the local folder and file extension, and whether items are
//! identified by server id or by hierarchical path. Stores and the engine are
//! generic over this configuration; nothing else differs between types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How artifacts of a type are identified locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// Opaque server id; files are flat in the type folder
    Id,
    /// Hierarchical path; files are nested below the type folder
    Path,
}

/// Static configuration of one artifact type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTypeConfig {
    /// Service name used in messages and the manifest
    pub service_name: &'static str,
    /// REST path relative to the API base URL
    pub uri_path: &'static str,
    /// Suffix appended to `uri_path` when listing all items
    pub all_uri_suffix: &'static str,
    /// Suffix appended to `uri_path` when listing items by modification date
    pub modified_uri_suffix: &'static str,
    /// Folder below the working directory
    pub folder: &'static str,
    /// File extension, including the leading dot or underscore
    pub extension: &'static str,
    /// Identity strategy
    pub identity: IdentityStrategy,
    /// Updates accept `forceOverride=true`
    pub force_override: bool,
    /// Creates accept `forceOverride=true`
    pub force_override_on_create: bool,
    /// Items carry a ready/draft `status`
    pub versioned: bool,
    /// Items carry a `tags` list that a push may extend
    pub supports_tags: bool,
    /// Items may be assigned to a library
    pub supports_libraries: bool,
}

impl ItemTypeConfig {
    /// Whether the type is addressed by path
    #[must_use]
    pub fn is_path_based(&self) -> bool {
        self.identity == IdentityStrategy::Path
    }
}

const BY_MODIFIED: &str = "/views/by-modified";

static TYPES: ItemTypeConfig = ItemTypeConfig {
    service_name: "types",
    uri_path: "/authoring/v1/types",
    all_uri_suffix: "",
    modified_uri_suffix: BY_MODIFIED,
    folder: "types",
    extension: "_tmd.json",
    identity: IdentityStrategy::Path,
    force_override: true,
    force_override_on_create: false,
    versioned: true,
    supports_tags: true,
    supports_libraries: true,
};

static CONTENT: ItemTypeConfig = ItemTypeConfig {
    service_name: "content",
    uri_path: "/authoring/v1/content",
    all_uri_suffix: "",
    modified_uri_suffix: BY_MODIFIED,
    folder: "content",
    extension: "_cmd.json",
    identity: IdentityStrategy::Id,
    force_override: true,
    force_override_on_create: true,
    versioned: true,
    supports_tags: true,
    supports_libraries: true,
};

// The plain categories listing only returns top-level taxonomies, so both
// listings go through the by-modified view to get the whole hierarchy.
static CATEGORIES: ItemTypeConfig = ItemTypeConfig {
    service_name: "categories",
    uri_path: "/authoring/v1/categories",
    all_uri_suffix: BY_MODIFIED,
    modified_uri_suffix: BY_MODIFIED,
    folder: "categories",
    extension: ".json",
    identity: IdentityStrategy::Id,
    force_override: true,
    force_override_on_create: false,
    versioned: false,
    supports_tags: false,
    supports_libraries: true,
};

static LAYOUTS: ItemTypeConfig = ItemTypeConfig {
    service_name: "layouts",
    uri_path: "/authoring/v1/layouts",
    all_uri_suffix: "",
    modified_uri_suffix: BY_MODIFIED,
    folder: "layouts",
    extension: ".json",
    identity: IdentityStrategy::Path,
    force_override: true,
    force_override_on_create: false,
    versioned: false,
    supports_tags: false,
    supports_libraries: false,
};

static LAYOUT_MAPPINGS: ItemTypeConfig = ItemTypeConfig {
    service_name: "layout-mappings",
    uri_path: "/authoring/v1/layout-mappings",
    all_uri_suffix: "",
    modified_uri_suffix: BY_MODIFIED,
    folder: "layout-mappings",
    extension: ".json",
    identity: IdentityStrategy::Path,
    force_override: true,
    force_override_on_create: false,
    versioned: false,
    supports_tags: false,
    supports_libraries: false,
};

static SITES: ItemTypeConfig = ItemTypeConfig {
    service_name: "sites",
    uri_path: "/authoring/v1/sites",
    all_uri_suffix: "",
    modified_uri_suffix: "",
    folder: "sites",
    extension: ".json",
    identity: IdentityStrategy::Id,
    force_override: true,
    force_override_on_create: false,
    versioned: true,
    supports_tags: false,
    supports_libraries: false,
};

static PAGES: ItemTypeConfig = ItemTypeConfig {
    service_name: "pages",
    uri_path: "/authoring/v1/sites/default/pages",
    all_uri_suffix: "",
    modified_uri_suffix: BY_MODIFIED,
    folder: "pages",
    extension: "_cmd.json",
    identity: IdentityStrategy::Path,
    force_override: true,
    force_override_on_create: false,
    versioned: true,
    supports_tags: false,
    supports_libraries: false,
};

static IMAGE_PROFILES: ItemTypeConfig = ItemTypeConfig {
    service_name: "image-profiles",
    uri_path: "/authoring/v1/image-profiles",
    all_uri_suffix: "",
    modified_uri_suffix: BY_MODIFIED,
    folder: "image-profiles",
    extension: ".json",
    identity: IdentityStrategy::Id,
    force_override: false,
    force_override_on_create: false,
    versioned: false,
    supports_tags: false,
    supports_libraries: false,
};

static RENDITIONS: ItemTypeConfig = ItemTypeConfig {
    service_name: "renditions",
    uri_path: "/authoring/v1/renditions",
    all_uri_suffix: "",
    modified_uri_suffix: "",
    folder: "renditions",
    extension: ".json",
    identity: IdentityStrategy::Id,
    force_override: false,
    force_override_on_create: false,
    versioned: false,
    supports_tags: false,
    supports_libraries: false,
};

static PUBLISHING_PROFILES: ItemTypeConfig = ItemTypeConfig {
    service_name: "publishing-profiles",
    uri_path: "/publishing/v1/profiles",
    all_uri_suffix: "",
    modified_uri_suffix: "",
    folder: "publishing-profiles",
    extension: ".json",
    identity: IdentityStrategy::Id,
    force_override: false,
    force_override_on_create: false,
    versioned: false,
    supports_tags: false,
    supports_libraries: false,
};

static PUBLISHING_SOURCES: ItemTypeConfig = ItemTypeConfig {
    service_name: "publishing-sources",
    uri_path: "/publishing/v1/sources",
    all_uri_suffix: "",
    modified_uri_suffix: "",
    folder: "publishing-sources",
    extension: ".json",
    identity: IdentityStrategy::Id,
    force_override: false,
    force_override_on_create: false,
    versioned: false,
    supports_tags: false,
    supports_libraries: false,
};

static PUBLISHING_SITE_REVISIONS: ItemTypeConfig = ItemTypeConfig {
    service_name: "publishing-site-revisions",
    uri_path: "/publishing/v1/sites/default/revisions",
    all_uri_suffix: "",
    modified_uri_suffix: "",
    folder: "publishing-site-revisions",
    extension: ".json",
    identity: IdentityStrategy::Id,
    force_override: false,
    force_override_on_create: false,
    versioned: false,
    supports_tags: false,
    supports_libraries: false,
};

/// Artifact types known to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Content types
    Types,
    /// Content items
    Content,
    /// Categories and taxonomies
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

impl ArtifactKind {
    /// Push order: referenced types go before the types referencing them
    pub const PUSH_ORDER: [Self; 12] = [
        Self::ImageProfiles,
        Self::Categories,
        Self::Renditions,
        Self::Layouts,
        Self::Types,
        Self::LayoutMappings,
        Self::Content,
        Self::Sites,
        Self::Pages,
        Self::PublishingSources,
        Self::PublishingProfiles,
        Self::PublishingSiteRevisions,
    ];

    /// Pull order
    pub const PULL_ORDER: [Self; 12] = [
        Self::ImageProfiles,
        Self::Categories,
        Self::Renditions,
        Self::Layouts,
        Self::Types,
        Self::LayoutMappings,
        Self::Content,
        Self::Sites,
        Self::Pages,
        Self::PublishingProfiles,
        Self::PublishingSiteRevisions,
        Self::PublishingSources,
    ];

    /// Configuration for this type
    #[must_use]
    pub fn config(self) -> &'static ItemTypeConfig {
        match self {
            Self::Types => &TYPES,
            Self::Content => &CONTENT,
            Self::Categories => &CATEGORIES,
            Self::Layouts => &LAYOUTS,
            Self::LayoutMappings => &LAYOUT_MAPPINGS,
            Self::Sites => &SITES,
            Self::Pages => &PAGES,
            Self::ImageProfiles => &IMAGE_PROFILES,
            Self::Renditions => &RENDITIONS,
            Self::PublishingProfiles => &PUBLISHING_PROFILES,
            Self::PublishingSources => &PUBLISHING_SOURCES,
            Self::PublishingSiteRevisions => &PUBLISHING_SITE_REVISIONS,
        }
    }

    /// Service name, e.g. `layout-mappings`
    #[must_use]
    pub fn service_name(self) -> &'static str {
        self.config().service_name
    }

    /// Look up a kind by its service name
    #[must_use]
    pub fn from_service_name(name: &str) -> Option<Self> {
        Self::PUSH_ORDER
            .into_iter()
            .find(|kind| kind.service_name() == name)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}
