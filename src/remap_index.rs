//! The remap index: which archive owns which names, and which renames each archive carries.
//!
//! [`RemapIndexBuilder`] is fed every file once during the pre-scan sweep. Calling
//! [`RemapIndexBuilder::build`] derives the per-archive renames and freezes the tries into a
//! [`RemapIndex`], which only answers queries.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::element::{ArchiveId, ClassPathElement};
use crate::names;
use crate::rename::Rename;
use crate::resource::ClassPathResource;
use crate::trie::PrefixTrie;

const META_INF: &str = "META-INF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolKind {
    Class,
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Indexed {
    element: usize,
    kind: SymbolKind,
}

#[derive(Debug, Default)]
pub struct RemapIndexBuilder {
    elements: BTreeMap<usize, Rc<ClassPathElement>>,
    top_level: BTreeMap<usize, BTreeSet<String>>,
    paths: PrefixTrie<Indexed>,
    packages: PrefixTrie<usize>,
    indexed: usize,
}

impl RemapIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one resource. Directories and detached resources are ignored.
    pub fn add_resource(&mut self, resource: &ClassPathResource) {
        if !resource.is_file() {
            return;
        }
        let Some(element) = resource.element() else {
            return;
        };
        let segs = names::segments(resource.name());
        if segs.is_empty() {
            return;
        }

        let ordinal = element.ordinal();
        self.elements
            .entry(ordinal)
            .or_insert_with(|| Rc::clone(element));

        let kind = if resource.is_class() {
            SymbolKind::Class
        } else {
            SymbolKind::Resource
        };
        self.paths.insert(
            &segs,
            Indexed {
                element: ordinal,
                kind,
            },
        );

        if kind == SymbolKind::Class {
            let package = &segs[..segs.len() - 1];
            if let Some(top) = package.first() {
                self.packages.insert(package, ordinal);
                if *top != META_INF {
                    self.top_level
                        .entry(ordinal)
                        .or_default()
                        .insert((*top).to_string());
                }
            }
        }
        self.indexed += 1;
    }

    /// Derives renames and freezes the index.
    ///
    /// A relocated, non-root archive gets one rename per top-level package seen among its
    /// classes (`com` -> `<prefix>/com`), after any renames configured explicitly.
    pub fn build(self) -> RemapIndex {
        let mut renames = BTreeMap::new();
        for (ordinal, element) in &self.elements {
            if element.is_root() {
                if !element.explicit_renames().is_empty() {
                    warn!(archive = %element.id(), "ignoring explicit renames on root archive");
                }
                continue;
            }
            let mut rules: Vec<Rename> = element.explicit_renames().to_vec();
            if let Some(prefix) = element.relocation() {
                let destination: Vec<String> =
                    names::segments(prefix).into_iter().map(str::to_string).collect();
                for top in self.top_level.get(ordinal).into_iter().flatten() {
                    let mut dest = destination.clone();
                    dest.push(top.clone());
                    rules.push(Rename::from_segments(
                        vec![top.clone()],
                        dest,
                        element.hide_classes(),
                    ));
                }
            }
            if rules.is_empty() {
                continue;
            }
            for rule in &rules {
                debug!(archive = %element.id(), rename = %rule, "derived rename");
            }
            renames.insert(*ordinal, rules);
        }

        RemapIndex {
            elements: self.elements,
            renames,
            paths: self.paths,
            packages: self.packages,
            indexed: self.indexed,
        }
    }
}

/// Frozen result of the pre-scan sweep.
#[derive(Debug)]
pub struct RemapIndex {
    elements: BTreeMap<usize, Rc<ClassPathElement>>,
    renames: BTreeMap<usize, Vec<Rename>>,
    paths: PrefixTrie<Indexed>,
    packages: PrefixTrie<usize>,
    indexed: usize,
}

/// Renames of one archive that indexes a queried name.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub element: usize,
    pub renames: &'a [Rename],
}

impl RemapIndex {
    pub fn renames_for(&self, element: usize) -> &[Rename] {
        self.renames.get(&element).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn archive_id(&self, element: usize) -> Option<&ArchiveId> {
        self.elements.get(&element).map(|e| e.id())
    }

    /// Number of file resources indexed.
    pub fn indexed_resources(&self) -> usize {
        self.indexed
    }

    pub fn rename_count(&self) -> usize {
        self.renames.values().map(Vec::len).sum()
    }

    /// Every rename, grouped by archive in registration order.
    pub fn renames(&self) -> impl Iterator<Item = (&ArchiveId, &[Rename])> + '_ {
        self.renames.iter().filter_map(|(ordinal, rules)| {
            self.elements
                .get(ordinal)
                .map(|e| (e.id(), rules.as_slice()))
        })
    }

    /// Archives holding a file at exactly `path`, in registration order.
    pub fn owners(&self, path: &str) -> Vec<usize> {
        let segs = names::segments(path);
        let owners: BTreeSet<usize> = self.paths.at(&segs).iter().map(|i| i.element).collect();
        owners.into_iter().collect()
    }

    /// Renames of every archive that indexes `kind` entries at or below `path`.
    pub fn candidates(&self, path: &str, kind: SymbolKind) -> Vec<Candidate<'_>> {
        let segs = names::segments(path);
        let elements: BTreeSet<usize> = self
            .paths
            .under(&segs)
            .into_iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.element)
            .collect();
        self.with_renames(elements)
    }

    /// Renames of every archive with classes in `package` (slash form) or beneath it.
    pub fn package_candidates(&self, package: &str) -> Vec<Candidate<'_>> {
        let segs = names::segments(package);
        let elements: BTreeSet<usize> = self.packages.under(&segs).into_iter().copied().collect();
        self.with_renames(elements)
    }

    fn with_renames(&self, elements: BTreeSet<usize>) -> Vec<Candidate<'_>> {
        elements
            .into_iter()
            .filter_map(|element| {
                self.renames.get(&element).map(|rules| Candidate {
                    element,
                    renames: rules.as_slice(),
                })
            })
            .collect()
    }
}
