//! Orchestrates the three sweeps of a relocation and reports what happened.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::element::ClassPath;
use crate::error::{Error, Result};
use crate::pipeline::{ArchiveInventory, Counters, Pipeline, Stage, Sweep, SweepContext};
use crate::remap_index::RemapIndex;
use crate::rename::Rename;
use crate::resource::{ClassPathResource, Timestamp};
use crate::stages::{self, StageRegistry};

/// One entry of the output archive.
#[derive(Debug, Clone, Copy)]
pub struct OutputEntry<'a> {
    /// Full entry path, version prefix included. Directories end with `/`.
    pub name: &'a str,
    pub timestamp: Timestamp,
    pub content: &'a [u8],
    pub directory: bool,
}

impl<'a> OutputEntry<'a> {
    pub fn new(name: &'a str, timestamp: Timestamp, content: &'a [u8], directory: bool) -> Self {
        Self {
            name,
            timestamp,
            content,
            directory,
        }
    }
}

/// A resource prepared for the sink: its full name is computed once and borrowed by the entry.
pub(crate) struct PreparedEntry<'r> {
    name: String,
    resource: &'r ClassPathResource,
}

impl<'r> PreparedEntry<'r> {
    pub(crate) fn new(resource: &'r ClassPathResource) -> Self {
        Self {
            name: resource.full_name(),
            resource,
        }
    }

    pub(crate) fn entry(&self) -> Result<OutputEntry<'_>> {
        let content: &[u8] = if self.resource.is_directory() {
            &[]
        } else {
            self.resource.content()?
        };
        Ok(OutputEntry::new(
            &self.name,
            self.resource.timestamp(),
            content,
            self.resource.is_directory(),
        ))
    }
}

/// Receives the surviving resources of the process sweep, in order.
pub trait ResourceSink {
    fn accept(&mut self, entry: OutputEntry<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Abort on the first duplicate output path instead of keeping the first copy.
    pub fail_on_duplicate: bool,
    /// Optional stages from the [`StageRegistry`], by name.
    pub extra_stages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TransformSummary {
    pub elements: usize,
    pub stages: Vec<&'static str>,
    pub resources: BTreeMap<Sweep, usize>,
    pub renames: BTreeMap<String, Vec<Rename>>,
    pub archives: Vec<ArchiveInventory>,
    pub shared_entries: Vec<String>,
    #[serde(flatten)]
    pub counters: Counters,
}

/// Renames derived by the pre-scan sweep, without writing anything.
#[derive(Debug, Serialize)]
pub struct TransformPlan {
    pub indexed_resources: usize,
    pub renames: BTreeMap<String, Vec<Rename>>,
}

fn renames_by_archive(index: &RemapIndex) -> BTreeMap<String, Vec<Rename>> {
    index
        .renames()
        .map(|(id, rules)| (id.to_string(), rules.to_vec()))
        .collect()
}

pub struct Transformer {
    options: TransformOptions,
    registry: StageRegistry,
}

impl Transformer {
    pub fn new(options: TransformOptions) -> Self {
        Self::with_registry(options, StageRegistry::default())
    }

    pub fn with_registry(options: TransformOptions, registry: StageRegistry) -> Self {
        Self { options, registry }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Relocates `class_path` into `sink`: pre-scan, freeze the index, scan, process.
    pub fn transform(
        &self,
        class_path: &ClassPath,
        sink: &mut dyn ResourceSink,
    ) -> Result<TransformSummary> {
        let mut stages: Vec<Box<dyn Stage + '_>> = stages::standard(sink);
        for name in &self.options.extra_stages {
            stages.push(self.registry.create(name)?);
        }
        let mut pipeline = Pipeline::new(stages);
        let mut context = SweepContext::new(self.options.fail_on_duplicate);
        let mut resources = BTreeMap::new();

        resources.insert(
            Sweep::PreScan,
            pipeline.sweep(Sweep::PreScan, class_path, &mut context)?,
        );
        context.freeze_index()?;
        resources.insert(
            Sweep::Scan,
            pipeline.sweep(Sweep::Scan, class_path, &mut context)?,
        );
        resources.insert(
            Sweep::Process,
            pipeline.sweep(Sweep::Process, class_path, &mut context)?,
        );

        let summary = TransformSummary {
            elements: class_path.len(),
            stages: pipeline.stage_names(),
            resources,
            renames: renames_by_archive(context.remap_index()?),
            archives: context.inventory().archives().cloned().collect(),
            shared_entries: context.inventory().shared().map(str::to_string).collect(),
            counters: context.counters().clone(),
        };
        info!(
            emitted = summary.counters.emitted,
            duplicates = summary.counters.duplicates,
            failures = summary.counters.failures,
            "transform finished"
        );
        Ok(summary)
    }

    /// Runs only the pre-scan sweep and returns the frozen index.
    pub fn index(&self, class_path: &ClassPath) -> Result<RemapIndex> {
        let mut pipeline = Pipeline::new(stages::indexing());
        let mut context = SweepContext::new(self.options.fail_on_duplicate);
        pipeline.sweep(Sweep::PreScan, class_path, &mut context)?;
        context.freeze_index()?;
        context
            .into_index()
            .ok_or_else(|| Error::InconsistentState("pre-scan produced no index".into()))
    }

    pub fn plan(&self, class_path: &ClassPath) -> Result<TransformPlan> {
        let index = self.index(class_path)?;
        Ok(TransformPlan {
            indexed_resources: index.indexed_resources(),
            renames: renames_by_archive(&index),
        })
    }
}
