//! Chain-of-responsibility pipeline driven over the classpath three times.
//!
//! Stages run in ascending priority (ties broken by name). Each stage receives the resource
//! and a [`Next`] handle; calling [`Next::proceed`] runs the remainder of the chain and
//! returns what survived it. A stage drops a resource by returning an empty outcome, or
//! replaces or expands it by returning something else.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::element::ClassPath;
use crate::error::{Error, Result};
use crate::remap_index::{RemapIndex, RemapIndexBuilder};
use crate::remapper::{RemapCache, SymbolRemapper};
use crate::resource::ClassPathResource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sweep {
    /// Builds the remap index. Nothing is rewritten.
    PreScan,
    /// Read-only discovery over the frozen index.
    Scan,
    /// Rewrites and emits.
    Process,
}

impl fmt::Display for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sweep::PreScan => "pre-scan",
            Sweep::Scan => "scan",
            Sweep::Process => "process",
        };
        f.write_str(name)
    }
}

/// What survives a stage: nothing, the resource (possibly replaced), or several resources.
pub type Outcome = Vec<ClassPathResource>;

pub trait Stage {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32;

    fn pre_scan(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        next.proceed(resource)
    }

    fn scan(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        next.proceed(resource)
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        next.proceed(resource)
    }
}

/// The rest of the chain, as seen from one stage.
pub struct Next<'p, 's> {
    sweep: Sweep,
    stages: &'p mut [Box<dyn Stage + 's>],
    context: &'p mut SweepContext,
}

impl Next<'_, '_> {
    pub fn sweep(&self) -> Sweep {
        self.sweep
    }

    pub fn context(&mut self) -> &mut SweepContext {
        self.context
    }

    /// Runs the remaining stages. Past the last stage the resource survives as is.
    pub fn proceed(&mut self, resource: ClassPathResource) -> Result<Outcome> {
        let Some((stage, rest)) = self.stages.split_first_mut() else {
            return Ok(vec![resource]);
        };
        let next = Next {
            sweep: self.sweep,
            stages: rest,
            context: &mut *self.context,
        };
        match self.sweep {
            Sweep::PreScan => stage.pre_scan(resource, next),
            Sweep::Scan => stage.scan(resource, next),
            Sweep::Process => stage.process(resource, next),
        }
    }
}

/// Counters accumulated over a transform.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Counters {
    pub emitted: usize,
    pub directories_synthesized: usize,
    pub classes_rewritten: usize,
    pub classes_renamed: usize,
    pub resources_renamed: usize,
    pub service_files_rewritten: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveInventory {
    pub id: String,
    pub classes: usize,
    pub resources: usize,
}

/// Discovery results from the scan sweep.
#[derive(Debug, Default)]
pub struct Inventory {
    archives: BTreeMap<usize, ArchiveInventory>,
    owners: HashMap<String, usize>,
    shared: BTreeSet<String>,
}

impl Inventory {
    /// Counts one file. Returns `true` the first time an entry turns out to be offered by
    /// more than one archive.
    pub fn record(&mut self, resource: &ClassPathResource) -> bool {
        let Some(element) = resource.element() else {
            return false;
        };
        let ordinal = element.ordinal();
        let archive = self
            .archives
            .entry(ordinal)
            .or_insert_with(|| ArchiveInventory {
                id: element.id().to_string(),
                ..ArchiveInventory::default()
            });
        if resource.is_class() {
            archive.classes += 1;
        } else {
            archive.resources += 1;
        }

        let full_name = resource.full_name();
        match self.owners.get(&full_name) {
            None => {
                self.owners.insert(full_name, ordinal);
                false
            }
            Some(owner) if *owner != ordinal => self.shared.insert(full_name),
            Some(_) => false,
        }
    }

    pub fn archives(&self) -> impl Iterator<Item = &ArchiveInventory> {
        self.archives.values()
    }

    /// Entries offered by more than one archive, sorted.
    pub fn shared(&self) -> impl Iterator<Item = &str> {
        self.shared.iter().map(String::as_str)
    }
}

/// State shared by the stages across all three sweeps of one transform.
#[derive(Debug)]
pub struct SweepContext {
    fail_on_duplicate: bool,
    builder: Option<RemapIndexBuilder>,
    index: Option<RemapIndex>,
    remap_cache: RemapCache,
    inventory: Inventory,
    counters: Counters,
}

impl SweepContext {
    pub fn new(fail_on_duplicate: bool) -> Self {
        Self {
            fail_on_duplicate,
            builder: Some(RemapIndexBuilder::new()),
            index: None,
            remap_cache: RemapCache::new(),
            inventory: Inventory::default(),
            counters: Counters::default(),
        }
    }

    pub fn fail_on_duplicate(&self) -> bool {
        self.fail_on_duplicate
    }

    /// The index under construction; only available before [`SweepContext::freeze_index`].
    pub fn index_builder(&mut self) -> Result<&mut RemapIndexBuilder> {
        self.builder.as_mut().ok_or_else(|| {
            Error::InconsistentState("remap index is frozen; it cannot take new resources".into())
        })
    }

    pub fn freeze_index(&mut self) -> Result<&RemapIndex> {
        let builder = self
            .builder
            .take()
            .ok_or_else(|| Error::InconsistentState("remap index frozen twice".into()))?;
        let index = builder.build();
        info!(
            indexed = index.indexed_resources(),
            renames = index.rename_count(),
            "remap index frozen"
        );
        Ok(self.index.insert(index))
    }

    pub fn remap_index(&self) -> Result<&RemapIndex> {
        self.index.as_ref().ok_or_else(|| {
            Error::InconsistentState("remap index used before the pre-scan sweep finished".into())
        })
    }

    /// A remapper over the frozen index. All stages share one cache, so each symbol is
    /// resolved and reported once per transform.
    pub fn remapper(&mut self) -> Result<SymbolRemapper<'_>> {
        let index = self.index.as_ref().ok_or_else(|| {
            Error::InconsistentState("remap index used before the pre-scan sweep finished".into())
        })?;
        Ok(SymbolRemapper::new(index, &mut self.remap_cache))
    }

    pub fn remap_cache(&self) -> &RemapCache {
        &self.remap_cache
    }

    pub fn into_index(self) -> Option<RemapIndex> {
        self.index
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }
}

pub struct Pipeline<'s> {
    stages: Vec<Box<dyn Stage + 's>>,
}

impl<'s> Pipeline<'s> {
    pub fn new(mut stages: Vec<Box<dyn Stage + 's>>) -> Self {
        stages.sort_by(|a, b| (a.priority(), a.name()).cmp(&(b.priority(), b.name())));
        debug!(stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(), "pipeline order");
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Drives one resource through every stage.
    pub fn run(
        &mut self,
        sweep: Sweep,
        resource: ClassPathResource,
        context: &mut SweepContext,
    ) -> Result<Outcome> {
        Next {
            sweep,
            stages: self.stages.as_mut_slice(),
            context,
        }
        .proceed(resource)
    }

    /// Runs one sweep over every element, in registration order.
    ///
    /// Failing to open an element aborts the sweep. A resource that fails to read or parse
    /// is logged and skipped; any other error aborts.
    pub fn sweep(
        &mut self,
        sweep: Sweep,
        class_path: &ClassPath,
        context: &mut SweepContext,
    ) -> Result<usize> {
        let mut seen = 0;
        for element in class_path.elements() {
            let resources = element.resources()?;
            for resource in resources {
                seen += 1;
                let name = resource.full_name();
                match self.run(sweep, resource, context) {
                    Ok(_) => {}
                    Err(err) if err.is_resource_failure() => {
                        warn!(%sweep, archive = %element.id(), name = %name, error = %err, "skipping resource");
                        if sweep == Sweep::Process {
                            context.counters_mut().failures += 1;
                        }
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        info!(%sweep, resources = seen, "sweep finished");
        Ok(seen)
    }
}
