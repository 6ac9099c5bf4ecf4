use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};
use crate::resource::Timestamp;
use crate::transform::{OutputEntry, ResourceSink};

/// Writes entries into a new jar, deflating files.
pub struct ZipSink<W: Write + Seek> {
    writer: ZipWriter<W>,
    entries: usize,
}

impl ZipSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path).map_err(|source| Error::ArchiveOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: ZipWriter::new(writer),
            entries: 0,
        }
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Writes the central directory and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        Ok(self.writer.finish()?)
    }
}

impl<W: Write + Seek> ResourceSink for ZipSink<W> {
    fn accept(&mut self, entry: OutputEntry<'_>) -> Result<()> {
        let base = FileOptions::default().last_modified_time(entry.timestamp);
        if entry.directory {
            self.writer
                .add_directory(entry.name, base.compression_method(CompressionMethod::Stored))?;
        } else {
            self.writer
                .start_file(entry.name, base.compression_method(CompressionMethod::Deflated))?;
            self.writer.write_all(entry.content)?;
        }
        self.entries += 1;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub name: String,
    pub timestamp: Timestamp,
    pub content: Vec<u8>,
    pub directory: bool,
}

/// Collects entries in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Vec<MemoryEntry>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&MemoryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

impl ResourceSink for MemorySink {
    fn accept(&mut self, entry: OutputEntry<'_>) -> Result<()> {
        self.entries.push(MemoryEntry {
            name: entry.name.to_string(),
            timestamp: entry.timestamp,
            content: entry.content.to_vec(),
            directory: entry.directory,
        });
        Ok(())
    }
}
