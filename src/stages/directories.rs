use std::collections::HashSet;

use tracing::trace;

use crate::error::Result;
use crate::names;
use crate::pipeline::{Next, Outcome, Stage};
use crate::resource::ClassPathResource;
use crate::stages::{REBUILD_DIRECTORIES, STRIP_DIRECTORIES};

/// Drops source directory entries in every sweep; the output tree is rebuilt from files.
#[derive(Debug, Default)]
pub struct StripDirectoriesStage;

impl StripDirectoriesStage {
    fn strip(resource: ClassPathResource, next: &mut Next<'_, '_>) -> Result<Outcome> {
        if resource.is_directory() {
            return Ok(Vec::new());
        }
        next.proceed(resource)
    }
}

impl Stage for StripDirectoriesStage {
    fn name(&self) -> &'static str {
        "strip-directories"
    }

    fn priority(&self) -> i32 {
        STRIP_DIRECTORIES
    }

    fn pre_scan(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        Self::strip(resource, &mut next)
    }

    fn scan(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        Self::strip(resource, &mut next)
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        Self::strip(resource, &mut next)
    }
}

/// Emits every ancestor directory of each surviving file, once, ahead of the file.
#[derive(Debug, Default)]
pub struct RebuildDirectoriesStage {
    emitted: HashSet<String>,
}

impl RebuildDirectoriesStage {
    pub fn new() -> Self {
        Self::default()
    }

    fn directory_for(dir: &str, file: &ClassPathResource) -> ClassPathResource {
        match file.version_prefix() {
            Some(prefix) if dir.len() > prefix.len() && dir.starts_with(prefix) => {
                ClassPathResource::directory(&dir[prefix.len()..], file.timestamp())
                    .with_prefix(Some(prefix.to_string()))
            }
            _ => ClassPathResource::directory(dir, file.timestamp()),
        }
    }
}

impl Stage for RebuildDirectoriesStage {
    fn name(&self) -> &'static str {
        "rebuild-directories"
    }

    fn priority(&self) -> i32 {
        REBUILD_DIRECTORIES
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        let outcome = next.proceed(resource)?;
        let mut out = Vec::with_capacity(outcome.len());
        let mut synthesized = 0;
        for survivor in outcome {
            if survivor.is_directory() {
                if self.emitted.insert(survivor.full_name()) {
                    out.push(survivor);
                }
                continue;
            }
            let full_name = survivor.full_name();
            for dir in names::ancestor_directories(&full_name) {
                if self.emitted.contains(&dir) {
                    continue;
                }
                trace!(directory = %dir, "synthesizing directory");
                out.push(Self::directory_for(&dir, &survivor));
                self.emitted.insert(dir);
                synthesized += 1;
            }
            out.push(survivor);
        }
        next.context().counters_mut().directories_synthesized += synthesized;
        Ok(out)
    }
}
