//! The stages of the standard relocation pipeline, and the registry of optional ones.

mod classes;
mod directories;
mod duplicates;
mod emit;
mod filters;
mod index;
mod multi_release;
mod resources;
mod services;

use std::collections::BTreeMap;

pub use classes::ClassBodyStage;
pub use directories::{RebuildDirectoriesStage, StripDirectoriesStage};
pub use duplicates::DuplicateStage;
pub use emit::EmitStage;
pub use filters::{ManifestFilterStage, MavenMetadataStage, SignatureFilterStage};
pub use index::{InventoryStage, RemapIndexStage};
pub use multi_release::{MultiReleaseStage, split_version_prefix};
pub use resources::ResourceRenameStage;
pub use services::ServiceFileStage;

use crate::error::{Error, Result};
use crate::pipeline::Stage;
use crate::transform::ResourceSink;

pub const EMIT: i32 = -100;
pub const MULTI_RELEASE: i32 = 0;
pub const STRIP_DIRECTORIES: i32 = 10;
pub const SIGNATURE_FILTER: i32 = 20;
pub const MANIFEST_FILTER: i32 = 30;
pub const MAVEN_METADATA: i32 = 35;
pub const CLASS_BODY: i32 = 40;
pub const SERVICE_FILES: i32 = 45;
pub const RESOURCE_RENAME: i32 = 50;
pub const REBUILD_DIRECTORIES: i32 = 90;
pub const INDEX: i32 = 95;
pub const DUPLICATES: i32 = 100;

/// The fixed stage set every transform runs, emitting into `sink`.
pub fn standard<'s>(sink: &'s mut dyn ResourceSink) -> Vec<Box<dyn Stage + 's>> {
    vec![
        Box::new(EmitStage::new(sink)),
        Box::new(MultiReleaseStage::new()),
        Box::new(StripDirectoriesStage),
        Box::new(SignatureFilterStage),
        Box::new(ManifestFilterStage),
        Box::new(ClassBodyStage::new()),
        Box::new(ServiceFileStage::new()),
        Box::new(ResourceRenameStage),
        Box::new(RebuildDirectoriesStage::new()),
        Box::new(RemapIndexStage),
        Box::new(InventoryStage),
        Box::new(DuplicateStage::new()),
    ]
}

/// Only what the pre-scan sweep needs, for planning without output.
pub fn indexing() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(MultiReleaseStage::new()),
        Box::new(StripDirectoriesStage),
        Box::new(RemapIndexStage),
    ]
}

pub type StageConstructor = fn() -> Box<dyn Stage>;

/// Optional stages, created by name from configuration.
pub struct StageRegistry {
    constructors: BTreeMap<&'static str, StageConstructor>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(MavenMetadataStage::NAME, || Box::new(MavenMetadataStage));
        registry
    }
}

impl StageRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, constructor: StageConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Stage>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| Error::UnknownStage(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::sink::MemorySink;

    #[test]
    fn standard_order_matches_priorities() {
        let mut sink = MemorySink::new();
        let pipeline = Pipeline::new(standard(&mut sink));
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "emit",
                "multi-release",
                "strip-directories",
                "signature-filter",
                "manifest-filter",
                "class-body",
                "service-files",
                "resource-rename",
                "rebuild-directories",
                "inventory",
                "remap-index",
                "duplicates",
            ]
        );
    }

    #[test]
    fn registry_creates_known_stages_only() {
        let registry = StageRegistry::default();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["strip-maven-metadata"]);
        assert_eq!(registry.create("strip-maven-metadata").unwrap().priority(), MAVEN_METADATA);
        assert!(matches!(
            registry.create("nope"),
            Err(Error::UnknownStage(name)) if name == "nope"
        ));
    }
}
