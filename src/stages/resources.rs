use tracing::debug;

use crate::error::Result;
use crate::pipeline::{Next, Outcome, Stage};
use crate::resource::ClassPathResource;
use crate::stages::RESOURCE_RENAME;

/// Moves non-class files of relocated archives using their own archive's renames.
#[derive(Debug, Default)]
pub struct ResourceRenameStage;

impl Stage for ResourceRenameStage {
    fn name(&self) -> &'static str {
        "resource-rename"
    }

    fn priority(&self) -> i32 {
        RESOURCE_RENAME
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        if !resource.is_file() || resource.is_class() || resource.is_root() {
            return next.proceed(resource);
        }
        let Some(ordinal) = resource.element().map(|e| e.ordinal()) else {
            return next.proceed(resource);
        };
        let renamed = next
            .context()
            .remap_index()?
            .renames_for(ordinal)
            .iter()
            .find_map(|rule| rule.rename_path(resource.name()));

        match renamed {
            Some(name) => {
                debug!(from = resource.name(), to = %name, "relocating resource");
                next.context().counters_mut().resources_renamed += 1;
                next.proceed(resource.with_name(name))
            }
            None => next.proceed(resource),
        }
    }
}
