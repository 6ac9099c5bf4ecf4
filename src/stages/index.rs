use tracing::info;

use crate::error::Result;
use crate::pipeline::{Next, Outcome, Stage};
use crate::resource::ClassPathResource;
use crate::stages::INDEX;

/// Pre-scan: feeds every file into the remap index builder.
#[derive(Debug, Default)]
pub struct RemapIndexStage;

impl Stage for RemapIndexStage {
    fn name(&self) -> &'static str {
        "remap-index"
    }

    fn priority(&self) -> i32 {
        INDEX
    }

    fn pre_scan(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        next.context().index_builder()?.add_resource(&resource);
        next.proceed(resource)
    }
}

/// Scan: counts files per archive and notes entries offered by more than one archive.
#[derive(Debug, Default)]
pub struct InventoryStage;

impl Stage for InventoryStage {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn priority(&self) -> i32 {
        INDEX
    }

    fn scan(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        if resource.is_file() && next.context().inventory_mut().record(&resource) {
            info!(name = %resource.full_name(), "entry offered by more than one archive");
        }
        next.proceed(resource)
    }
}
