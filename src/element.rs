//! Classpath elements: one per input jar or class directory.

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ignore::WalkBuilder;
use memmap2::Mmap;
use serde::Serialize;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::names;
use crate::rename::Rename;
use crate::resource::{
    timestamp_from_system_time, ClassPathResource, ContentSource, JarArchive, Tags, Timestamp,
};

/// Stable, human-readable identity of an input archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArchiveId(String);

impl ArchiveId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registration request for one input.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    pub path: PathBuf,
    pub relocation: Option<String>,
    pub hide_classes: bool,
    pub id: Option<String>,
    pub root: bool,
    pub renames: Vec<Rename>,
}

impl ElementSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn relocate(mut self, prefix: impl Into<String>) -> Self {
        self.relocation = Some(prefix.into());
        self
    }

    pub fn hide_classes(mut self, hide: bool) -> Self {
        self.hide_classes = hide;
        self
    }

    pub fn root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn rename(mut self, rename: Rename) -> Self {
        self.renames.push(rename);
        self
    }
}

#[derive(Debug)]
pub struct ClassPathElement {
    ordinal: usize,
    path: PathBuf,
    relocation: Option<String>,
    hide_classes: bool,
    id: ArchiveId,
    tags: Tags,
    renames: Vec<Rename>,
}

impl ClassPathElement {
    fn from_spec(ordinal: usize, spec: ElementSpec) -> Self {
        let id = spec.id.map(ArchiveId::new).unwrap_or_else(|| {
            ArchiveId::new(
                spec.path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| spec.path.to_string_lossy().to_string()),
            )
        });
        let relocation = spec
            .relocation
            .as_deref()
            .map(names::normalize_prefix)
            .filter(|p| !p.is_empty());
        let tags = if spec.root { Tags::ROOT_JAR } else { Tags::empty() };
        Self {
            ordinal,
            path: spec.path,
            relocation,
            hide_classes: spec.hide_classes,
            id,
            tags,
            renames: spec.renames,
        }
    }

    /// Registration order within the classpath; earlier elements win ambiguous renames.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Relocation prefix in slash form, e.g. `vendored/lib`.
    pub fn relocation(&self) -> Option<&str> {
        self.relocation.as_deref()
    }

    pub fn hide_classes(&self) -> bool {
        self.hide_classes
    }

    pub fn id(&self) -> &ArchiveId {
        &self.id
    }

    pub fn tags(&self) -> Tags {
        self.tags
    }

    pub fn is_root(&self) -> bool {
        self.tags.contains(Tags::ROOT_JAR)
    }

    /// Renames configured explicitly for this element.
    pub fn explicit_renames(&self) -> &[Rename] {
        &self.renames
    }

    /// Opens the element and iterates its entries in archive (or walk) order.
    ///
    /// The archive stays open for as long as the iterator or any resource it produced
    /// is alive.
    pub fn resources(self: &Rc<Self>) -> Result<ElementResources> {
        let entries = if self.path.is_dir() {
            self.walk_directory()?
        } else {
            self.open_archive()?
        };
        Ok(ElementResources {
            element: Rc::clone(self),
            entries,
        })
    }

    fn open_archive(&self) -> Result<Entries> {
        let open_error = |source| Error::ArchiveOpen {
            path: self.path.clone(),
            source,
        };
        let file = File::open(&self.path).map_err(open_error)?;
        // SAFETY: the mapping is read-only and owned by the archive reader; the jar is not
        // expected to change underneath a single transform.
        let mmap = unsafe { Mmap::map(&file) }.map_err(open_error)?;
        let archive = ZipArchive::new(Cursor::new(mmap)).map_err(|source| Error::ArchiveFormat {
            path: self.path.clone(),
            source,
        })?;
        let len = archive.len();
        debug!(archive = %self.id, entries = len, "opened archive");
        Ok(Entries::Archive {
            archive: Rc::new(RefCell::new(archive)),
            next: 0,
            len,
        })
    }

    fn walk_directory(&self) -> Result<Entries> {
        let mut entries = Vec::new();
        let walker = WalkBuilder::new(&self.path)
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(element = %self.id, error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.path) else {
                continue;
            };
            let mut name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if is_dir {
                name.push('/');
            }
            let timestamp = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(timestamp_from_system_time)
                .unwrap_or_default();
            entries.push(DirectoryEntry {
                name,
                path: entry.into_path(),
                timestamp,
            });
        }
        debug!(element = %self.id, entries = entries.len(), "walked directory");
        Ok(Entries::Directory(entries.into_iter()))
    }
}

struct DirectoryEntry {
    name: String,
    path: PathBuf,
    timestamp: Timestamp,
}

enum Entries {
    Archive {
        archive: Rc<RefCell<JarArchive>>,
        next: usize,
        len: usize,
    },
    Directory(std::vec::IntoIter<DirectoryEntry>),
}

/// Iterator over the resources of one element.
pub struct ElementResources {
    element: Rc<ClassPathElement>,
    entries: Entries,
}

impl Iterator for ElementResources {
    type Item = ClassPathResource;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.entries {
            Entries::Archive { archive, next, len } => {
                while *next < *len {
                    let index = *next;
                    *next += 1;
                    let header = {
                        let mut zip = archive.borrow_mut();
                        zip.by_index(index)
                            .map(|entry| (entry.name().to_string(), entry.last_modified()))
                    };
                    match header {
                        Ok((name, timestamp)) => {
                            let source = ContentSource::Archive {
                                archive: Rc::clone(archive),
                                index,
                            };
                            return Some(ClassPathResource::pending(
                                &self.element,
                                name,
                                timestamp,
                                source,
                            ));
                        }
                        Err(err) => {
                            warn!(
                                archive = %self.element.id,
                                index,
                                error = %err,
                                "skipping unreadable archive entry"
                            );
                        }
                    }
                }
                None
            }
            Entries::Directory(iter) => iter.next().map(|entry| {
                let source = if names::is_directory(&entry.name) {
                    ContentSource::Loaded
                } else {
                    ContentSource::File(entry.path)
                };
                ClassPathResource::pending(&self.element, entry.name, entry.timestamp, source)
            }),
        }
    }
}

/// The ordered set of inputs for one transform.
#[derive(Debug, Default)]
pub struct ClassPath {
    elements: Vec<Rc<ClassPathElement>>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spec: ElementSpec) -> Rc<ClassPathElement> {
        let element = Rc::new(ClassPathElement::from_spec(self.elements.len(), spec));
        self.elements.push(Rc::clone(&element));
        element
    }

    pub fn elements(&self) -> &[Rc<ClassPathElement>] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, FileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(content).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn archive_entries_are_tagged_in_zip_order() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib-1.0.jar");
        write_jar(
            &jar,
            &[
                ("com/", b""),
                ("com/acme/Widget.class", b"cafe"),
                ("com/acme/widget.properties", b"k=v"),
            ],
        );

        let mut cp = ClassPath::new();
        let element = cp.add(ElementSpec::new(&jar).relocate("vendored.lib").hide_classes(true));
        assert_eq!(element.id().as_str(), "lib-1.0.jar");
        assert_eq!(element.relocation(), Some("vendored/lib"));

        let resources: Vec<_> = element.resources().unwrap().collect();
        let names: Vec<&str> = resources.iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec!["com/", "com/acme/Widget.class", "com/acme/widget.properties"]
        );
        assert!(resources[0].is_directory());
        assert!(resources[1].is_class());
        assert!(!resources[2].is_class() && resources[2].is_file());
        assert_eq!(resources[1].content().unwrap(), b"cafe");
        assert!(!resources[1].is_root());
    }

    #[test]
    fn directories_are_walked_with_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("org/example")).unwrap();
        std::fs::write(dir.path().join("org/example/A.class"), b"a").unwrap();

        let mut cp = ClassPath::new();
        let element = cp.add(ElementSpec::new(dir.path()).root().id("classes"));
        let mut names: Vec<String> = element
            .resources()
            .unwrap()
            .map(|r| r.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["org/", "org/example/", "org/example/A.class"]);

        let class = element
            .resources()
            .unwrap()
            .find(|r| r.is_class())
            .unwrap();
        assert!(class.is_root());
        assert_eq!(class.content().unwrap(), b"a");
    }

    #[test]
    fn missing_archive_is_fatal() {
        let mut cp = ClassPath::new();
        let element = cp.add(ElementSpec::new("/definitely/not/here.jar"));
        assert!(matches!(element.resources(), Err(Error::ArchiveOpen { .. })));
    }

    #[test]
    fn non_zip_file_is_an_archive_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.jar");
        std::fs::write(&bogus, b"this is not a zip file at all").unwrap();
        let mut cp = ClassPath::new();
        let element = cp.add(ElementSpec::new(&bogus));
        assert!(matches!(element.resources(), Err(Error::ArchiveFormat { .. })));
    }

    #[test]
    fn ordinals_follow_registration() {
        let mut cp = ClassPath::new();
        let a = cp.add(ElementSpec::new("a.jar"));
        let b = cp.add(ElementSpec::new("b.jar"));
        assert_eq!((a.ordinal(), b.ordinal()), (0, 1));
        assert_eq!(cp.len(), 2);
    }
}
