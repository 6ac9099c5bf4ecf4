//! Resources drawn from classpath elements.
//!
//! A [`ClassPathResource`] is an immutable handle: renaming, re-prefixing or replacing its
//! content produces a new handle. Content is read from the backing archive or file the
//! first time it is asked for and shared by every copy made afterwards.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::SystemTime;

use bitflags::bitflags;
use chrono::{DateTime, Datelike, Timelike, Utc};
use memmap2::Mmap;
use zip::ZipArchive;

use crate::element::ClassPathElement;
use crate::error::{Error, Result};
use crate::names;

pub(crate) type JarArchive = ZipArchive<Cursor<Mmap>>;

/// Entry timestamp, in the resolution ZIP archives store.
pub type Timestamp = zip::DateTime;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Tags: u8 {
        const FILE = 1 << 0;
        const DIRECTORY = 1 << 1;
        const CLASS = 1 << 2;
        const RESOURCE = 1 << 3;
        /// The consumer's own archive: never relocated, manifest and module descriptor kept.
        const ROOT_JAR = 1 << 4;
    }
}

impl Tags {
    /// Structural tags implied by an entry name.
    pub fn for_entry(name: &str) -> Tags {
        if names::is_directory(name) {
            Tags::DIRECTORY | Tags::RESOURCE
        } else if names::is_class_file(name) {
            Tags::FILE | Tags::CLASS
        } else {
            Tags::FILE | Tags::RESOURCE
        }
    }
}

pub(crate) enum ContentSource {
    Loaded,
    Archive {
        archive: Rc<RefCell<JarArchive>>,
        index: usize,
    },
    File(PathBuf),
}

struct LazyContent {
    source: ContentSource,
    cell: OnceCell<Vec<u8>>,
}

impl LazyContent {
    fn pending(source: ContentSource) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    fn loaded(bytes: Vec<u8>) -> Self {
        Self {
            source: ContentSource::Loaded,
            cell: OnceCell::from(bytes),
        }
    }

    fn get(&self, name: &str) -> Result<&[u8]> {
        if let Some(bytes) = self.cell.get() {
            return Ok(bytes.as_slice());
        }
        let bytes = self.read(name)?;
        Ok(self.cell.get_or_init(|| bytes).as_slice())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let read_error = |reason: String| Error::ResourceRead {
            name: name.to_string(),
            reason,
        };
        match &self.source {
            ContentSource::Loaded => Ok(Vec::new()),
            ContentSource::Archive { archive, index } => {
                let mut archive = archive.borrow_mut();
                let mut entry = archive
                    .by_index(*index)
                    .map_err(|e| read_error(e.to_string()))?;
                let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
                entry
                    .read_to_end(&mut buf)
                    .map_err(|e| read_error(e.to_string()))?;
                Ok(buf)
            }
            ContentSource::File(path) => std::fs::read(path).map_err(|e| read_error(e.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct ClassPathResource {
    name: String,
    version_prefix: Option<String>,
    timestamp: Timestamp,
    element: Option<Rc<ClassPathElement>>,
    content: Rc<LazyContent>,
    tags: Tags,
}

impl fmt::Debug for ClassPathResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassPathResource")
            .field("name", &self.name)
            .field("version_prefix", &self.version_prefix)
            .field("element", &self.element.as_ref().map(|e| e.id().as_str()))
            .field("tags", &self.tags)
            .finish()
    }
}

impl ClassPathResource {
    pub(crate) fn pending(
        element: &Rc<ClassPathElement>,
        name: String,
        timestamp: Timestamp,
        source: ContentSource,
    ) -> Self {
        let tags = Tags::for_entry(&name) | (element.tags() & Tags::ROOT_JAR);
        Self {
            name,
            version_prefix: None,
            timestamp,
            element: Some(Rc::clone(element)),
            content: Rc::new(LazyContent::pending(source)),
            tags,
        }
    }

    /// A detached resource with in-memory content.
    pub fn from_bytes(name: impl Into<String>, content: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            tags: Tags::for_entry(&name),
            name,
            version_prefix: None,
            timestamp: Timestamp::default(),
            element: None,
            content: Rc::new(LazyContent::loaded(content)),
        }
    }

    /// A detached resource read from `path` on first use.
    #[cfg(test)]
    pub(crate) fn from_file(name: impl Into<String>, path: PathBuf) -> Self {
        let name = name.into();
        Self {
            tags: Tags::for_entry(&name),
            name,
            version_prefix: None,
            timestamp: Timestamp::default(),
            element: None,
            content: Rc::new(LazyContent::pending(ContentSource::File(path))),
        }
    }

    /// A synthesized directory entry; `name` must end with `/`.
    pub fn directory(name: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            name: name.into(),
            version_prefix: None,
            timestamp,
            element: None,
            content: Rc::new(LazyContent::loaded(Vec::new())),
            tags: Tags::DIRECTORY | Tags::RESOURCE,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version_prefix(&self) -> Option<&str> {
        self.version_prefix.as_deref()
    }

    /// The name as it will be written: version prefix followed by the name.
    pub fn full_name(&self) -> String {
        match &self.version_prefix {
            Some(prefix) => format!("{prefix}{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn element(&self) -> Option<&Rc<ClassPathElement>> {
        self.element.as_ref()
    }

    pub fn tags(&self) -> Tags {
        self.tags
    }

    pub fn is_class(&self) -> bool {
        self.tags.contains(Tags::CLASS)
    }

    pub fn is_file(&self) -> bool {
        self.tags.contains(Tags::FILE)
    }

    pub fn is_directory(&self) -> bool {
        self.tags.contains(Tags::DIRECTORY)
    }

    pub fn is_root(&self) -> bool {
        self.tags.contains(Tags::ROOT_JAR)
    }

    /// Loads (once) and returns the entry bytes.
    pub fn content(&self) -> Result<&[u8]> {
        self.content.get(&self.name)
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn with_content(&self, content: Vec<u8>) -> Self {
        Self {
            content: Rc::new(LazyContent::loaded(content)),
            ..self.clone()
        }
    }

    pub fn with_prefix(&self, prefix: Option<String>) -> Self {
        Self {
            version_prefix: prefix,
            ..self.clone()
        }
    }

    /// Attaches the resource to `element`, inheriting its ROOT_JAR tag.
    pub fn with_element(&self, element: &Rc<ClassPathElement>) -> Self {
        Self {
            element: Some(Rc::clone(element)),
            tags: (self.tags - Tags::ROOT_JAR) | (element.tags() & Tags::ROOT_JAR),
            ..self.clone()
        }
    }
}

/// Converts a filesystem modification time to a ZIP timestamp (UTC).
///
/// Times outside the ZIP range (1980 to 2107) collapse to the ZIP epoch.
pub fn timestamp_from_system_time(time: SystemTime) -> Timestamp {
    let utc: DateTime<Utc> = time.into();
    let (Ok(year), Ok(month), Ok(day)) = (
        u16::try_from(utc.year()),
        u8::try_from(utc.month()),
        u8::try_from(utc.day()),
    ) else {
        return Timestamp::default();
    };
    Timestamp::from_date_and_time(
        year,
        month,
        day,
        utc.hour() as u8,
        utc.minute() as u8,
        utc.second() as u8,
    )
    .unwrap_or_default()
}
